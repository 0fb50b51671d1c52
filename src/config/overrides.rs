use serde::Serialize;
use std::path::PathBuf;

/// Values given on the command line, layered over every other source
///
/// Only fields the user actually set are serialized, so an absent flag never
/// clobbers a value from a config file or the environment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub run: RunOverrides,
    pub walk: WalkOverrides,
    pub detect: DetectOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_unmatched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_by_rule: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalkOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sniffing: Option<bool>,
}
