//! # fileintel - rule-driven file classification with an audit trail
//!
//! Walks one or more source trees, matches every file against an ordered list
//! of rules (content-derived MIME type or extension, first match wins), and
//! for each match:
//!
//! - hashes the full content with SHA-256, streaming in fixed-size chunks
//! - extracts best-effort metadata (image dimensions, EXIF highlights)
//! - copies it under the destination, preserving its path relative to its root
//!   and never overwriting an existing output
//!
//! Every visited file gets one audit row; the audit is written once, as CSV,
//! when the run finishes.
//!
//! ## Quick Start
//!
//! ```bash
//! # See what would happen
//! fileintel run /media/card --dest ~/sorted --dry-run
//!
//! # Do it
//! fileintel run /media/card --dest ~/sorted
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use fileintel::pipeline::{Pipeline, RunConfig};
//! use fileintel::rules::{Rule, RuleSet};
//!
//! let rules = RuleSet::new(vec![Rule::new("All images", ["image/*"], [".heic"])?])?;
//! let config = RunConfig::new(vec!["/media/card".into()], "/srv/sorted", rules);
//! let report = Pipeline::new(config).run()?;
//! println!("audit at {}", report.audit_path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod copy;
pub mod detect;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod parallel;
pub mod pipeline;
pub mod rules;

pub use cli::{Cli, Output};
pub use config::FileIntelConfig;
pub use error::RunError;

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
