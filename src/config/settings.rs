//! Typed configuration

use crate::error::RunError;
use crate::pipeline::{DEFAULT_IGNORE_DIRS, DEFAULT_WORKERS, RunConfig};
use crate::rules::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Merged configuration, one field per section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub run: RunSettings,
    pub walk: WalkSettings,
    pub detect: DetectSettings,
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub roots: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    pub dry_run: bool,
    pub record_unmatched: bool,
    pub bucket_by_rule: bool,
    /// 0 = auto
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            dest: None,
            dry_run: false,
            record_unmatched: false,
            bucket_by_rule: false,
            workers: DEFAULT_WORKERS,
            audit_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSettings {
    pub follow_symlinks: bool,
    pub ignore_dirs: Vec<String>,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectSettings {
    pub content_sniffing: bool,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self { content_sniffing: true }
    }
}

/// One `[[rules]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub mime_patterns: Vec<String>,
    #[serde(default)]
    pub ext_patterns: Vec<String>,
}

impl RuleConfig {
    pub fn to_rule(&self) -> Result<Rule, RunError> {
        Ok(Rule::new(&self.name, &self.mime_patterns, &self.ext_patterns)?)
    }
}

impl Settings {
    /// Validated rule set, in configured order
    pub fn rule_set(&self) -> Result<RuleSet, RunError> {
        let rules = self
            .rules
            .iter()
            .map(RuleConfig::to_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet::new(rules)?)
    }

    /// Turn the merged configuration into the value a run consumes
    pub fn into_run_config(self) -> Result<RunConfig, RunError> {
        let rules = self.rule_set()?;
        if self.run.roots.is_empty() {
            return Err(RunError::NoRoots);
        }
        let dest = self.run.dest.ok_or(RunError::NoDestination)?;

        Ok(RunConfig {
            roots: self.run.roots,
            dest,
            rules,
            dry_run: self.run.dry_run,
            record_unmatched: self.run.record_unmatched,
            bucket_by_rule: self.run.bucket_by_rule,
            follow_symlinks: self.walk.follow_symlinks,
            ignore_dirs: self.walk.ignore_dirs,
            workers: self.run.workers,
            audit_dir: self.run.audit_dir,
            content_sniffing: self.detect.content_sniffing,
        })
    }
}
