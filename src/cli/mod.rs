//! Command-line interface for fileintel
//!
//! Parses arguments with clap, sets up logging and dispatches to the command
//! implementations. Everything here is a thin shell over the library.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

pub mod commands;
pub mod output;

pub use output::Output;

/// fileintel - rule-driven file classification with an audit trail
#[derive(Parser)]
#[command(
    name = "fileintel",
    version = env!("CARGO_PKG_VERSION"),
    about = "Classify files by content and extension, copy matches and write a CSV audit",
    long_about = "fileintel walks source directories, matches each file against ordered rules \
                  (MIME type or extension, first match wins), hashes and copies matches into a \
                  destination tree that mirrors the source layout, and records every decision \
                  in an audit CSV."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use only this configuration file (plus defaults and environment)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk source roots, copy matching files and write the audit
    Run(commands::run::RunArgs),
    /// List the effective classification rules
    Rules(commands::rules::RulesArgs),
    /// Configuration management
    Config(commands::config::ConfigArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);
        let custom_config = self.config.as_deref();

        match self.command {
            Some(Commands::Run(args)) => commands::run::execute(args, custom_config, &output).await,
            Some(Commands::Rules(args)) => commands::rules::execute(args, custom_config, &output).await,
            Some(Commands::Config(args)) => commands::config::execute(args, custom_config, &output).await,
            None => {
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // Keep ignore/globset quiet unless everything is requested
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
        2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // stderr, so CSV and JSON on stdout stay clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["fileintel", "-vv", "run", "/a", "/b", "--dest", "/out", "--dry-run"]);
        assert_eq!(cli.verbose, 2);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.roots.len(), 2);
        assert!(args.dry_run);
        assert_eq!(args.dest.as_deref(), Some(std::path::Path::new("/out")));
    }
}
