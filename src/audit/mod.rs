//! Audit trail
//!
//! One [`ProcessedFile`] per visited file, kept in memory for the whole run
//! and written once at the end as CSV with the columns
//! `time, rule, src, mime, ext, sha256, size, copied_to, metadata`.
//!
//! Rows come out in dispatch order regardless of which worker finished first.
//! The file is staged under a hidden `.partial` name and renamed into place,
//! so an interrupted flush never leaves a truncated audit behind.

use crate::copy::NOT_COPIED;
use crate::metadata::Metadata;
use crate::rules::NO_MATCH;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Key under which a stage failure is recorded in the metadata cell
pub const ERROR_KEY: &str = "_error";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Audit record for a single visited file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    /// Dispatch sequence number; the only ordering key
    pub seq: u64,
    pub time: DateTime<Utc>,
    /// Matching rule, `None` when no rule claimed the file
    pub rule: Option<String>,
    pub src: PathBuf,
    pub mime: String,
    pub ext: String,
    /// Empty when hashing was skipped or failed
    pub sha256: Option<String>,
    pub size: Option<u64>,
    /// `None` when nothing was written (dry run, no match, failure)
    pub copied_to: Option<PathBuf>,
    pub metadata: Metadata,
    /// `"<stage>: <message>"` for a failed stage
    pub error: Option<String>,
}

impl ProcessedFile {
    /// Record with only the detected signals filled in
    pub fn new(seq: u64, src: impl Into<PathBuf>, mime: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            seq,
            time: Utc::now(),
            rule: None,
            src: src.into(),
            mime: mime.into(),
            ext: ext.into(),
            sha256: None,
            size: None,
            copied_to: None,
            metadata: Metadata::new(),
            error: None,
        }
    }

    /// Stamp the processing time; called once every stage has contributed
    pub fn finalize(mut self) -> Self {
        self.time = Utc::now();
        self
    }

    pub fn is_matched(&self) -> bool {
        self.rule.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn to_row(&self) -> Result<AuditRow, serde_json::Error> {
        let mut cell = serde_json::Map::new();
        for (key, value) in &self.metadata {
            cell.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        if let Some(error) = &self.error {
            cell.insert(ERROR_KEY.to_string(), serde_json::Value::String(error.clone()));
        }

        Ok(AuditRow {
            time: self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            rule: self.rule.clone().unwrap_or_else(|| NO_MATCH.to_string()),
            src: self.src.display().to_string(),
            mime: self.mime.clone(),
            ext: self.ext.clone(),
            sha256: self.sha256.clone().unwrap_or_default(),
            size: self.size.map(|s| s.to_string()).unwrap_or_default(),
            copied_to: self
                .copied_to
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| NOT_COPIED.to_string()),
            metadata: serde_json::to_string(&cell)?,
        })
    }
}

/// CSV row; field order is the column order
#[derive(Debug, Serialize)]
struct AuditRow {
    time: String,
    rule: String,
    src: String,
    mime: String,
    ext: String,
    sha256: String,
    size: String,
    copied_to: String,
    metadata: String,
}

/// Thread-safe accumulator of audit records
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Mutex<Vec<ProcessedFile>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; the lock is held only for the push
    pub fn record(&self, record: ProcessedFile) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the log, returning records in dispatch order
    pub fn into_records(self) -> Vec<ProcessedFile> {
        let mut records = self.records.into_inner().unwrap_or_else(PoisonError::into_inner);
        records.sort_by_key(|r| r.seq);
        records
    }
}

/// Write the header and one row per record
pub fn write_csv<W: Write>(records: &[ProcessedFile], writer: W) -> Result<(), AuditError> {
    let mut csv = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for record in records {
        csv.serialize(record.to_row()?)?;
    }
    if records.is_empty() {
        // serde-driven headers are only emitted with the first row
        csv.write_record(HEADER)?;
    }
    csv.flush()?;
    Ok(())
}

/// Column names in output order
pub const HEADER: [&str; 9] = ["time", "rule", "src", "mime", "ext", "sha256", "size", "copied_to", "metadata"];

/// Audit file name for a run: `audit_<unix seconds>_<token>.csv`
pub fn audit_file_name(started: DateTime<Utc>, token: &str) -> String {
    format!("audit_{}_{}.csv", started.timestamp(), token)
}

/// Write `records` to `dir/file_name`, staging through a hidden partial file
pub fn flush(records: &[ProcessedFile], dir: &Path, file_name: &str) -> Result<PathBuf, AuditError> {
    let final_path = dir.join(file_name);
    let partial_path = dir.join(format!(".{file_name}.partial"));

    let result = (|| -> Result<(), AuditError> {
        let file = fs::File::create(&partial_path)?;
        let mut writer = io::BufWriter::new(file);
        write_csv(records, &mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&partial_path, &final_path)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&partial_path);
        return Err(e);
    }

    tracing::info!("Audit written to {} ({} rows)", final_path.display(), records.len());
    Ok(final_path)
}
