//! Structure-preserving copies into the destination tree
//!
//! A matched file at `<root>/a/b/c.jpg` is placed at `<dest>/a/b/c.jpg`
//! (optionally under a per-rule bucket). Existing outputs are never
//! overwritten: when the target name is taken the planner tries `c_1.jpg`,
//! `c_2.jpg`, ... and picks the first free name. A taken name whose content
//! has the same SHA-256 as the source is reused instead of copied again.
//!
//! In dry-run mode the planner only reads the destination tree.

use crate::hash::hash_file;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Audit value for the `copied_to` column when nothing was written
pub const NOT_COPIED: &str = "(not copied)";

/// Upper bound on disambiguation attempts for one file
const MAX_CANDIDATES: usize = 10_000;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("{src} is not under source root {root}")]
    OutsideRoot { src: PathBuf, root: PathBuf },

    #[error("no free destination name for {0} after {MAX_CANDIDATES} attempts")]
    NoFreeName(PathBuf),

    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        source: io::Error,
    },

    #[error("failed to inspect existing {path}: {source}")]
    Inspect { path: PathBuf, source: io::Error },
}

/// What the planner did with a matched file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Bytes were written to `dest`
    Copied { dest: PathBuf, bytes: u64 },
    /// `dest` already held identical content
    AlreadyPresent { dest: PathBuf },
    /// Dry run: `dest` is where the file would have gone
    Planned { dest: PathBuf },
}

impl Placement {
    pub fn dest(&self) -> &Path {
        match self {
            Placement::Copied { dest, .. } | Placement::AlreadyPresent { dest } | Placement::Planned { dest } => dest,
        }
    }

    /// Path for the audit `copied_to` column; `None` when nothing is on disk for this run
    pub fn into_copied_to(self) -> Option<PathBuf> {
        match self {
            Placement::Copied { dest, .. } | Placement::AlreadyPresent { dest } => Some(dest),
            Placement::Planned { .. } => None,
        }
    }
}

/// A matched file ready to be placed
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    pub src: &'a Path,
    pub root: &'a Path,
    pub rule: &'a str,
    /// Digest of `src`, used to recognise identical existing outputs
    pub sha256: &'a str,
}

/// Computes destinations and performs (or simulates) copies
pub struct CopyPlanner {
    dest: PathBuf,
    dry_run: bool,
    bucket_by_rule: bool,
    /// Destinations handed out during this run
    claimed: Mutex<HashSet<PathBuf>>,
}

impl CopyPlanner {
    pub fn new(dest: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            dest: dest.into(),
            dry_run,
            bucket_by_rule: false,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Place outputs under `<dest>/<rule name>/...`
    pub fn bucket_by_rule(mut self, enabled: bool) -> Self {
        self.bucket_by_rule = enabled;
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Undisambiguated destination for a file
    pub fn target_for(&self, src: &Path, root: &Path, rule: &str) -> Result<PathBuf, CopyError> {
        let relative = src.strip_prefix(root).map_err(|_| CopyError::OutsideRoot {
            src: src.to_path_buf(),
            root: root.to_path_buf(),
        })?;

        // Only plain segments survive so nothing can escape `dest`
        let relative: PathBuf = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();

        if relative.as_os_str().is_empty() {
            return Err(CopyError::OutsideRoot {
                src: src.to_path_buf(),
                root: root.to_path_buf(),
            });
        }

        let mut target = self.dest.clone();
        if self.bucket_by_rule {
            target.push(bucket_name(rule));
        }
        target.push(relative);
        Ok(target)
    }

    /// Resolve collisions and copy (or, in dry-run mode, only plan)
    pub fn place(&self, request: &CopyRequest<'_>) -> Result<Placement, CopyError> {
        let target = self.target_for(request.src, request.root, request.rule)?;

        for attempt in 0..MAX_CANDIDATES {
            let candidate = disambiguate(&target, attempt);

            if self.is_claimed(&candidate) {
                continue;
            }

            match fs::symlink_metadata(&candidate) {
                Ok(existing) => {
                    // Hash outside the lock; another placer may claim the name meanwhile
                    if !(existing.is_file() && same_content(&candidate, request.sha256)?) {
                        continue;
                    }
                    if !self.claim(&candidate) {
                        continue;
                    }
                    if self.dry_run {
                        tracing::debug!("Dry run: {} already present at {}", request.src.display(), candidate.display());
                        return Ok(Placement::Planned { dest: candidate });
                    }
                    tracing::debug!("{} already present at {}", request.src.display(), candidate.display());
                    return Ok(Placement::AlreadyPresent { dest: candidate });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CopyError::Inspect {
                        path: candidate,
                        source,
                    });
                }
            }

            if !self.claim(&candidate) {
                continue;
            }

            if self.dry_run {
                tracing::debug!("Dry run: would copy {} -> {}", request.src.display(), candidate.display());
                return Ok(Placement::Planned { dest: candidate });
            }

            match self.copy_to(request.src, &candidate) {
                Ok(bytes) => return Ok(Placement::Copied { dest: candidate, bytes }),
                // Appeared between the check and the copy; try the next name
                Err(CopyError::Copy { source, .. }) if source.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(CopyError::NoFreeName(target))
    }

    fn is_claimed(&self, candidate: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(candidate)
    }

    /// `false` when the name was already handed out
    fn claim(&self, candidate: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(candidate.to_path_buf())
    }

    fn copy_to(&self, src: &Path, dest: &Path) -> Result<u64, CopyError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| CopyError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        copy_file(src, dest).map_err(|source| CopyError::Copy {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source,
        })
    }
}

/// Byte-preserving copy that refuses to replace an existing file
fn copy_file(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|bytes| {
        writer.sync_all()?;
        Ok(bytes)
    });

    match copied {
        Ok(bytes) => {
            keep_permissions(dest, permissions);
            Ok(bytes)
        }
        Err(e) => {
            // Don't leave a partial file that would look like a prior output
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

/// Mirror the source mode; the bytes are already complete, so failure is only logged
fn keep_permissions(dest: &Path, permissions: fs::Permissions) {
    if let Err(e) = fs::set_permissions(dest, permissions) {
        tracing::warn!("Copied {} but could not set its permissions: {}", dest.display(), e);
    }
}

fn same_content(existing: &Path, sha256: &str) -> Result<bool, CopyError> {
    if sha256.is_empty() {
        return Ok(false);
    }
    hash_file(existing)
        .map(|digest| digest.sha256 == sha256)
        .map_err(|source| CopyError::Inspect {
            path: existing.to_path_buf(),
            source,
        })
}

/// `photo.jpg` -> `photo_<n>.jpg`; attempt 0 is the name itself
fn disambiguate(target: &Path, attempt: usize) -> PathBuf {
    if attempt == 0 {
        return target.to_path_buf();
    }

    let stem = target.file_stem().map(OsString::from).unwrap_or_default();
    let mut name = stem;
    name.push(format!("_{attempt}"));
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    target.with_file_name(name)
}

/// Rule name made safe for use as a single path segment
fn bucket_name(rule: &str) -> String {
    let cleaned: String = rule
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
