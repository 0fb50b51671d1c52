//! Run-level errors
//!
//! Only problems that make a run impossible (or its audit undeliverable) are
//! errors. Per-file failures are recorded in the audit instead.

use crate::audit::{AuditError, ProcessedFile};
use crate::rules::RuleError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("no source roots given")]
    NoRoots,

    #[error("no destination directory given")]
    NoDestination,

    #[error("source root {0} does not exist")]
    RootNotFound(PathBuf),

    #[error("source root {0} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("source root {path} is not readable: {source}")]
    RootUnreadable { path: PathBuf, source: io::Error },

    #[error("destination {path} is not usable: {source}")]
    DestinationUnusable { path: PathBuf, source: io::Error },

    #[error("audit directory {path} is not writable: {source}")]
    AuditDirUnusable { path: PathBuf, source: io::Error },

    #[error("invalid rules: {0}")]
    InvalidRules(#[from] RuleError),

    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidIgnorePattern { pattern: String, source: globset::Error },

    #[error("worker pool failed: {0}")]
    Execution(String),

    /// The run finished but the audit could not be written; the records
    /// are handed back so the caller can still surface them
    #[error("failed to write audit {path}: {source}")]
    AuditFlush {
        path: PathBuf,
        source: AuditError,
        records: Vec<ProcessedFile>,
    },
}

impl RunError {
    /// Records recovered from a failed flush
    pub fn into_records(self) -> Option<Vec<ProcessedFile>> {
        match self {
            RunError::AuditFlush { records, .. } => Some(records),
            _ => None,
        }
    }
}
