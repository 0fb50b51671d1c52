use super::OutputFormat;
use crate::cli::Output;
use crate::config::FileIntelConfig;
use anyhow::Result;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct RuleView {
    name: String,
    mime_patterns: Vec<String>,
    ext_patterns: Vec<String>,
}

/// List the effective rules in evaluation order
pub async fn execute(args: RulesArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = FileIntelConfig::load(custom_config, None::<()>)?;
    let rules = config.settings()?.rule_set()?;

    let views: Vec<RuleView> = rules
        .iter()
        .map(|rule| RuleView {
            name: rule.name().to_string(),
            mime_patterns: rule.mime_patterns().iter().map(|p| p.to_string()).collect(),
            ext_patterns: rule.ext_patterns().to_vec(),
        })
        .collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&views)?),
        OutputFormat::Text => {
            output.count("📋", "Rules (first match wins)", views.len());
            for (position, view) in views.iter().enumerate() {
                output.step(&format!("{}. {}", position + 1, view.name));
                output.table_row("MIME", &join_or_none(&view.mime_patterns));
                output.table_row("Extensions", &join_or_none(&view.ext_patterns));
            }
            if views.is_empty() {
                output.warning("No rules configured; every file will be unmatched");
            }
        }
    }
    Ok(())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
