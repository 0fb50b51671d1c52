//! Run statistics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Totals for one finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_discovered: usize,
    pub files_matched: usize,
    pub files_unmatched: usize,
    pub files_copied: usize,
    pub files_already_present: usize,
    /// Dry run: matched files that would have been copied
    pub files_planned: usize,
    pub files_failed: usize,
    pub walk_errors: usize,
    pub records_written: usize,
    pub bytes_hashed: u64,
    pub bytes_copied: u64,
    pub duration_ms: u64,
}

impl RunStats {
    /// Files per second over the whole run
    pub fn files_per_sec(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.files_discovered as f64 / (self.duration_ms as f64 / 1000.0)
    }

    /// Hashing throughput in MB/s
    pub fn throughput_mb_per_sec(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        let mb = self.bytes_hashed as f64 / (1024.0 * 1024.0);
        mb / (self.duration_ms as f64 / 1000.0)
    }
}

/// Thread-safe counters shared by the pipeline stages
#[derive(Debug, Default)]
pub struct StatsCollector {
    files_discovered: AtomicUsize,
    files_matched: AtomicUsize,
    files_unmatched: AtomicUsize,
    files_copied: AtomicUsize,
    files_already_present: AtomicUsize,
    files_planned: AtomicUsize,
    files_failed: AtomicUsize,
    walk_errors: AtomicUsize,
    bytes_hashed: AtomicU64,
    bytes_copied: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovered(&self, count: usize) {
        self.files_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_walk_errors(&self, count: usize) {
        self.walk_errors.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_matched(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unmatched(&self) {
        self.files_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_copied(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_already_present(&self) {
        self.files_already_present.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_planned(&self) {
        self.files_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_hashed(&self, bytes: u64) {
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn to_stats(&self, records_written: usize, duration_ms: u64) -> RunStats {
        RunStats {
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            files_unmatched: self.files_unmatched.load(Ordering::Relaxed),
            files_copied: self.files_copied.load(Ordering::Relaxed),
            files_already_present: self.files_already_present.load(Ordering::Relaxed),
            files_planned: self.files_planned.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            records_written,
            bytes_hashed: self.bytes_hashed.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            duration_ms,
        }
    }
}
