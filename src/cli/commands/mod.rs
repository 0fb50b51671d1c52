//! Command implementations for the fileintel CLI

pub mod config;
pub mod rules;
pub mod run;

use clap::ValueEnum;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
