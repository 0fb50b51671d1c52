//! Run orchestration
//!
//! A run moves through
//!
//! ```text
//! Idle → Walking → per file (Detecting → Matching → [Hashing → ExtractingMetadata → Copying]) → Flushing → Done
//! ```
//!
//! Startup problems (missing or unreadable roots, unusable destination) abort
//! before any file is touched. Once files are being processed only a failed
//! audit flush can fail the run; everything else is recorded per file.

pub mod file;
pub mod stats;
pub mod walk;

pub use file::Stage;
pub use stats::{RunStats, StatsCollector};
pub use walk::{DiscoveredFile, WalkOptions};

use crate::audit::{self, AuditLog, ProcessedFile};
use crate::copy::CopyPlanner;
use crate::detect::TypeDetector;
use crate::error::RunError;
use crate::metadata::MetadataRegistry;
use crate::parallel::{ExecutionStrategy, ProgressFn};
use crate::rules::RuleSet;
use chrono::Utc;
use file::Analyzer;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Worker pool size when none is configured
pub const DEFAULT_WORKERS: usize = 8;

/// Below this many files the pool is not worth starting
pub const MIN_FILES_FOR_PARALLEL: usize = 16;

/// Share of detected cores used when `workers = 0`
const AUTO_THREAD_PERCENTAGE: u8 = 75;

/// Directory names never descended into by default
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "$Recycle.Bin",
    "System Volume Information",
];

/// Everything a run needs, passed explicitly into [`Pipeline`]
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Source directories, walked in this order
    pub roots: Vec<PathBuf>,
    pub dest: PathBuf,
    pub rules: RuleSet,
    /// Do all the work except writing into `dest`
    pub dry_run: bool,
    /// Emit audit rows for files no rule matched
    pub record_unmatched: bool,
    pub bucket_by_rule: bool,
    pub follow_symlinks: bool,
    pub ignore_dirs: Vec<String>,
    /// 0 = auto, 1 = sequential
    pub workers: usize,
    /// Where the audit goes; defaults to `dest` (temp dir in a dry run)
    pub audit_dir: Option<PathBuf>,
    /// Disable to detect by extension only
    pub content_sniffing: bool,
}

impl RunConfig {
    pub fn new(roots: Vec<PathBuf>, dest: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            roots,
            dest: dest.into(),
            rules,
            dry_run: false,
            record_unmatched: false,
            bucket_by_rule: false,
            follow_symlinks: false,
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            workers: DEFAULT_WORKERS,
            audit_dir: None,
            content_sniffing: true,
        }
    }

    /// Audit directory after applying the dry-run default
    pub fn resolved_audit_dir(&self) -> PathBuf {
        match &self.audit_dir {
            Some(dir) => dir.clone(),
            None if self.dry_run => std::env::temp_dir(),
            None => self.dest.clone(),
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunReport {
    pub audit_path: PathBuf,
    /// Audit rows in the order they were written
    pub records: Vec<ProcessedFile>,
    pub stats: RunStats,
    pub dry_run: bool,
}

impl RunReport {
    pub fn failed_records(&self) -> impl Iterator<Item = &ProcessedFile> {
        self.records.iter().filter(|r| r.is_failed())
    }
}

/// Roots and destination after startup validation
struct Prepared {
    roots: Vec<PathBuf>,
    dest: PathBuf,
    /// `dest` when it exists, for pruning it from the walk
    existing_dest: Option<PathBuf>,
    audit_dir: PathBuf,
}

pub struct Pipeline {
    config: RunConfig,
    detector: TypeDetector,
    metadata: MetadataRegistry,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        let detector = if config.content_sniffing {
            TypeDetector::new()
        } else {
            TypeDetector::without_sniffer()
        };
        Self {
            config,
            detector,
            metadata: MetadataRegistry::with_defaults(),
        }
    }

    pub fn with_detector(mut self, detector: TypeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataRegistry) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport, RunError> {
        self.run_with_progress(None)
    }

    /// Run, reporting analysis progress as (completed, total, worker)
    pub fn run_with_progress(&self, progress: Option<&ProgressFn>) -> Result<RunReport, RunError> {
        let start_time = Instant::now();
        let started = Utc::now();
        let config = &self.config;

        let prepared = self.prepare()?;
        let audit_name = audit::audit_file_name(started, &run_token());
        tracing::info!(
            "Starting run over {} root(s) into {}{}",
            prepared.roots.len(),
            prepared.dest.display(),
            if config.dry_run { " (dry run)" } else { "" }
        );

        // Walking
        let stats = StatsCollector::new();
        let walk_options = WalkOptions {
            follow_symlinks: config.follow_symlinks,
            ignore_dirs: config.ignore_dirs.clone(),
            exclude: prepared.existing_dest.clone(),
        };
        let discovery = walk::discover(&prepared.roots, &walk_options)?;
        stats.add_discovered(discovery.files.len());
        stats.add_walk_errors(discovery.errors);

        // Analysis on the pool
        let workers = ExecutionStrategy::calculate_optimal_workers(config.workers, AUTO_THREAD_PERCENTAGE);
        let strategy = ExecutionStrategy::auto(discovery.files.len(), MIN_FILES_FOR_PARALLEL, workers);
        tracing::debug!("Analysing {} files with {:?}", discovery.files.len(), strategy);

        let analyzer = Analyzer {
            detector: &self.detector,
            rules: &config.rules,
            metadata: &self.metadata,
            stats: &stats,
        };
        let analyses = strategy
            .execute(discovery.files, |index, file, _| analyzer.analyze(index as u64, file), progress)
            .map_err(|e| RunError::Execution(e.to_string()))?;

        // Placement in dispatch order
        let planner = CopyPlanner::new(&prepared.dest, config.dry_run).bucket_by_rule(config.bucket_by_rule);
        let log = AuditLog::new();
        for analysis in analyses {
            if let Some(record) = file::place(analysis, &planner, config.record_unmatched, &stats) {
                log.record(record);
            }
        }

        // Flushing
        tracing::debug!("Flushing {} audit records", log.len());
        let records = log.into_records();
        let audit_path = match audit::flush(&records, &prepared.audit_dir, &audit_name) {
            Ok(path) => path,
            Err(source) => {
                return Err(RunError::AuditFlush {
                    path: prepared.audit_dir.join(&audit_name),
                    source,
                    records,
                });
            }
        };

        let stats = stats.to_stats(records.len(), start_time.elapsed().as_millis() as u64);
        tracing::info!(
            "Run complete: {} files, {} matched, {} failed in {}ms",
            stats.files_discovered,
            stats.files_matched,
            stats.files_failed,
            stats.duration_ms
        );

        Ok(RunReport {
            audit_path,
            records,
            stats,
            dry_run: config.dry_run,
        })
    }

    /// Validate roots, destination and audit directory before any file is read
    fn prepare(&self) -> Result<Prepared, RunError> {
        let config = &self.config;
        if config.roots.is_empty() {
            return Err(RunError::NoRoots);
        }
        if config.dest.as_os_str().is_empty() {
            return Err(RunError::NoDestination);
        }

        let roots = config
            .roots
            .iter()
            .map(|root| validate_root(root))
            .collect::<Result<Vec<_>, _>>()?;

        let dest_unusable = |source: io::Error| RunError::DestinationUnusable {
            path: config.dest.clone(),
            source,
        };
        if config.dry_run {
            if config.dest.exists() && !config.dest.is_dir() {
                return Err(dest_unusable(io::Error::other("not a directory")));
            }
        } else {
            fs::create_dir_all(&config.dest).map_err(dest_unusable)?;
            check_writable(&config.dest).map_err(dest_unusable)?;
        }

        let existing_dest = fs::canonicalize(&config.dest).ok();
        let dest = match &existing_dest {
            Some(dest) => dest.clone(),
            None => std::path::absolute(&config.dest).map_err(dest_unusable)?,
        };

        let audit_dir = config.resolved_audit_dir();
        let audit_unusable = |source: io::Error| RunError::AuditDirUnusable {
            path: audit_dir.clone(),
            source,
        };
        fs::create_dir_all(&audit_dir).map_err(audit_unusable)?;
        check_writable(&audit_dir).map_err(audit_unusable)?;

        Ok(Prepared {
            roots,
            dest,
            existing_dest,
            audit_dir,
        })
    }
}

/// Canonical form of a root that exists, is a directory and can be listed
fn validate_root(root: &Path) -> Result<PathBuf, RunError> {
    let metadata = fs::metadata(root).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => RunError::RootNotFound(root.to_path_buf()),
        _ => RunError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !metadata.is_dir() {
        return Err(RunError::RootNotDirectory(root.to_path_buf()));
    }

    let unreadable = |source| RunError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    fs::read_dir(root).map_err(unreadable)?;
    fs::canonicalize(root).map_err(unreadable)
}

/// Create and remove a uniquely named file in `dir`
fn check_writable(dir: &Path) -> io::Result<()> {
    let marker = dir.join(format!(".fileintel-write-check-{}", run_token()));
    OpenOptions::new().write(true).create_new(true).open(&marker)?;
    fs::remove_file(&marker)
}

/// Short random token distinguishing runs started in the same second
fn run_token() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}
