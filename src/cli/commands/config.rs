use crate::cli::Output;
use crate::config::FileIntelConfig;
use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
    /// Validate the merged configuration and its rules
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

pub async fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = FileIntelConfig::load(custom_config, None::<()>)?;

    match args.command {
        ConfigCommand::Show { format } => {
            let merged = config.get_full_config()?;
            let rendered = match format {
                ConfigFormat::Toml => toml::to_string_pretty(&merged)?,
                ConfigFormat::Json => serde_json::to_string_pretty(&merged)?,
            };
            println!("{rendered}");
        }
        ConfigCommand::Validate => {
            // Shape errors and rule errors both surface here
            let settings = config.settings()?;
            let rules = settings.rule_set()?;
            walk_patterns_valid(&settings.walk.ignore_dirs)?;

            output.success("Configuration is valid");
            output.table_row("Rules", &rules.len().to_string());
            output.table_row("Roots", &settings.run.roots.len().to_string());
            output.table_row(
                "Destination",
                &settings
                    .run
                    .dest
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "(set with --dest)".to_string()),
            );
            if output.is_verbose() {
                output.blank_line();
                output.step("Sources");
                for source in config.sources() {
                    output.list_item(&source);
                }
            }
        }
    }

    Ok(())
}

fn walk_patterns_valid(patterns: &[String]) -> Result<()> {
    crate::pipeline::walk::build_ignore_set(patterns)?;
    Ok(())
}
