//! Per-file processing
//!
//! Work for one file is split in two:
//!
//! ```text
//! analyze (worker pool)                 place (dispatch order)
//! Detecting → Matching → Hashing  ───▶  Copying → record
//!                      → ExtractingMetadata
//! ```
//!
//! Analysis only reads the source file, so it can run on any worker.
//! Placement claims destination names and must see files in dispatch order
//! for collision naming to be reproducible.

use super::stats::StatsCollector;
use super::walk::DiscoveredFile;
use crate::audit::ProcessedFile;
use crate::copy::{CopyPlanner, CopyRequest, Placement};
use crate::detect::TypeDetector;
use crate::hash::hash_file;
use crate::metadata::MetadataRegistry;
use crate::rules::RuleSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Per-file processing stage, used in error annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detecting,
    Matching,
    Hashing,
    ExtractingMetadata,
    Copying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Detecting => "detecting",
            Stage::Matching => "matching",
            Stage::Hashing => "hashing",
            Stage::ExtractingMetadata => "extracting metadata",
            Stage::Copying => "copying",
        };
        f.write_str(name)
    }
}

/// Outcome of the analysis phase for one file
#[derive(Debug)]
pub(crate) enum Analysis {
    /// No rule claimed the file
    Unmatched(ProcessedFile),
    /// Matched, hashed and ready to place
    Matched { record: ProcessedFile, root: PathBuf },
    /// Matched but a stage failed; nothing will be copied
    Failed(ProcessedFile),
}

/// Read-only collaborators for the analysis phase
pub(crate) struct Analyzer<'a> {
    pub detector: &'a TypeDetector,
    pub rules: &'a RuleSet,
    pub metadata: &'a MetadataRegistry,
    pub stats: &'a StatsCollector,
}

impl Analyzer<'_> {
    pub fn analyze(&self, seq: u64, file: &DiscoveredFile) -> Analysis {
        let path = &file.path;

        let detection = self.detector.detect(path);
        let mut record = ProcessedFile::new(seq, path.clone(), detection.mime, detection.ext);

        let Some(rule) = self.rules.first_match(&record.mime, &record.ext) else {
            tracing::trace!("No rule matched {} ({}, {})", path.display(), record.mime, record.ext);
            record.size = fs::metadata(path).ok().map(|m| m.len());
            return Analysis::Unmatched(record);
        };
        record.rule = Some(rule.name().to_string());
        tracing::debug!("{} matched rule '{}'", path.display(), rule.name());

        match hash_file(path) {
            Ok(digest) => {
                self.stats.add_bytes_hashed(digest.bytes);
                record.sha256 = Some(digest.sha256);
                record.size = Some(digest.bytes);
            }
            Err(e) => {
                tracing::warn!("Failed to hash {}: {}", path.display(), e);
                record.size = fs::metadata(path).ok().map(|m| m.len());
                record.error = Some(annotate(Stage::Hashing, &e));
                return Analysis::Failed(record);
            }
        }

        record.metadata = self.metadata.extract(path, &record.mime).into_metadata();

        Analysis::Matched {
            record,
            root: file.root.clone(),
        }
    }
}

/// Finish one analysed file; `None` when the file produces no audit row
pub(crate) fn place(
    analysis: Analysis,
    planner: &CopyPlanner,
    record_unmatched: bool,
    stats: &StatsCollector,
) -> Option<ProcessedFile> {
    match analysis {
        Analysis::Unmatched(record) => {
            stats.increment_unmatched();
            record_unmatched.then(|| record.finalize())
        }
        Analysis::Failed(record) => {
            stats.increment_matched();
            stats.increment_failed();
            Some(record.finalize())
        }
        Analysis::Matched { mut record, root } => {
            stats.increment_matched();

            let request = CopyRequest {
                src: &record.src,
                root: &root,
                rule: record.rule.as_deref().unwrap_or_default(),
                sha256: record.sha256.as_deref().unwrap_or_default(),
            };

            match planner.place(&request) {
                Ok(placement) => {
                    match &placement {
                        Placement::Copied { bytes, .. } => stats.increment_copied(*bytes),
                        Placement::AlreadyPresent { .. } => stats.increment_already_present(),
                        Placement::Planned { .. } => stats.increment_planned(),
                    }
                    record.copied_to = placement.into_copied_to();
                }
                Err(e) => {
                    tracing::warn!("Failed to copy {}: {}", record.src.display(), e);
                    stats.increment_failed();
                    record.error = Some(annotate(Stage::Copying, &e));
                }
            }

            Some(record.finalize())
        }
    }
}

fn annotate(stage: Stage, error: &dyn std::error::Error) -> String {
    format!("{stage}: {error}")
}
