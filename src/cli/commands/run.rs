use super::OutputFormat;
use crate::audit;
use crate::cli::Output;
use crate::cli::output::human_bytes;
use crate::config::overrides::{DetectOverrides, RunOverrides, WalkOverrides};
use crate::config::{ConfigOverrides, FileIntelConfig};
use crate::error::RunError;
use crate::pipeline::{Pipeline, RunReport, RunStats};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Source directories to walk (replaces `run.roots` from config)
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    /// Destination root for copies
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Do everything except writing into the destination
    #[arg(long)]
    pub dry_run: bool,

    /// Write audit rows for files no rule matched
    #[arg(long)]
    pub record_unmatched: bool,

    /// Copy into `<dest>/<rule name>/...`
    #[arg(long)]
    pub bucket_by_rule: bool,

    /// Worker threads (0 = auto, 1 = sequential)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Descend into symlinked directories (symlinked files are always processed)
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Extra directory-name globs to skip (repeatable)
    #[arg(long = "ignore-dir", value_name = "GLOB")]
    pub ignore_dirs: Vec<String>,

    /// Detect types by extension only
    #[arg(long)]
    pub no_sniff: bool,

    /// Where to write the audit CSV (default: the destination)
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            run: RunOverrides {
                roots: self.roots.clone(),
                dest: self.dest.clone(),
                dry_run: self.dry_run.then_some(true),
                record_unmatched: self.record_unmatched.then_some(true),
                bucket_by_rule: self.bucket_by_rule.then_some(true),
                workers: self.workers,
                audit_dir: self.audit_dir.clone(),
            },
            walk: WalkOverrides {
                follow_symlinks: self.follow_symlinks.then_some(true),
            },
            detect: DetectOverrides {
                content_sniffing: self.no_sniff.then_some(false),
            },
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    audit_path: String,
    dry_run: bool,
    stats: &'a RunStats,
    failures: Vec<Failure>,
}

#[derive(Serialize)]
struct Failure {
    src: String,
    error: String,
}

pub async fn execute(args: RunArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = FileIntelConfig::load(custom_config, Some(args.overrides()))?;
    let mut settings = config.settings()?;
    settings.walk.ignore_dirs.extend(args.ignore_dirs.iter().cloned());

    let run_config = settings.into_run_config().context("Cannot start run")?;
    let quiet_console = output.is_quiet() || args.format == OutputFormat::Json;
    if !quiet_console {
        output.header(if run_config.dry_run { "🔎 Dry run" } else { "📂 Classifying files" });
        for root in &run_config.roots {
            output.table_row("Source", &root.display().to_string());
        }
        output.table_row("Destination", &run_config.dest.display().to_string());
        output.table_row("Rules", &run_config.rules.len().to_string());
        output.blank_line();
    }

    let pb = if quiet_console {
        indicatif::ProgressBar::hidden()
    } else {
        output.progress_bar(0, "analysing")
    };
    let pipeline = Pipeline::new(run_config);
    let progress = pb.clone();
    let result = tokio::task::spawn_blocking(move || {
        let report = move |current: usize, total: usize, _worker: usize| {
            progress.set_length(total as u64);
            progress.set_position(current as u64);
        };
        pipeline.run_with_progress(Some(&report))
    })
    .await
    .context("Run task panicked")?;
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            match args.format {
                OutputFormat::Text => print_summary(&report, output),
                OutputFormat::Json => print_json(&report)?,
            }
            Ok(())
        }
        Err(err @ RunError::AuditFlush { .. }) => {
            let message = err.to_string();
            output.error(&message);
            output.error("Writing audit records to stdout instead");
            let records = err.into_records().unwrap_or_default();
            audit::write_csv(&records, io::stdout().lock())?;
            Err(anyhow::anyhow!(message))
        }
        Err(err) => Err(err).context("Cannot start run"),
    }
}

fn print_summary(report: &RunReport, output: &Output) {
    let stats = &report.stats;
    output.success(&format!(
        "{} {} files in {:.2}s",
        if report.dry_run { "Dry run checked" } else { "Processed" },
        stats.files_discovered,
        stats.duration_ms as f64 / 1000.0
    ));
    output.blank_line();
    output.table_row("Matched", &stats.files_matched.to_string());
    output.table_row("Unmatched", &stats.files_unmatched.to_string());
    if report.dry_run {
        output.table_row("Would copy", &stats.files_planned.to_string());
    } else {
        output.table_row("Copied", &format!("{} ({})", stats.files_copied, human_bytes(stats.bytes_copied)));
        output.table_row("Already present", &stats.files_already_present.to_string());
    }
    output.table_row("Failed", &stats.files_failed.to_string());
    if stats.walk_errors > 0 {
        output.table_row("Unreadable entries", &stats.walk_errors.to_string());
    }
    output.verbose(&format!(
        "Hashed {} at {:.1} MB/s",
        human_bytes(stats.bytes_hashed),
        stats.throughput_mb_per_sec()
    ));

    let failures: Vec<_> = report.failed_records().collect();
    if !failures.is_empty() {
        output.blank_line();
        output.count("⚠", "Files with errors", failures.len());
        for record in failures.iter().take(10) {
            output.list_item(&format!(
                "{}: {}",
                record.src.display(),
                record.error.as_deref().unwrap_or_default()
            ));
        }
        if failures.len() > 10 {
            output.indent(&format!("... and {} more (see audit)", failures.len() - 10));
        }
    }

    output.blank_line();
    output.key_value("Audit", &report.audit_path.display().to_string(), true);
}

fn print_json(report: &RunReport) -> Result<()> {
    let summary = Summary {
        audit_path: report.audit_path.display().to_string(),
        dry_run: report.dry_run,
        stats: &report.stats,
        failures: report
            .failed_records()
            .map(|record| Failure {
                src: record.src.display().to_string(),
                error: record.error.clone().unwrap_or_default(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
