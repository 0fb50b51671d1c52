//! Source tree discovery

use crate::error::RunError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A regular file found under a source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Canonical root the file was found under
    pub root: PathBuf,
    /// `root` joined with the file's relative path
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub follow_symlinks: bool,
    /// Glob patterns matched against directory names
    pub ignore_dirs: Vec<String>,
    /// Subtree never descended into (the destination, when it lies inside a root)
    pub exclude: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    /// Entries that could not be read; logged and skipped
    pub errors: usize,
}

/// Create a GlobSet from directory-name patterns
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, RunError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| RunError::InvalidIgnorePattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| RunError::InvalidIgnorePattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// Enumerate every regular file under `roots`
///
/// Roots are walked in the given order and entries are sorted by file name
/// within each directory, so the result is reproducible. A file reachable
/// through more than one root (overlapping roots, symlinks) is reported once,
/// under the first root that reached it.
pub fn discover(roots: &[PathBuf], options: &WalkOptions) -> Result<Discovery, RunError> {
    let ignore_set = build_ignore_set(&options.ignore_dirs)?;
    let mut discovery = Discovery::default();
    let mut seen = HashSet::new();

    for root in roots {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false) // No .gitignore semantics: every file is evidence
            .hidden(false)
            .follow_links(options.follow_symlinks)
            .sort_by_file_name(|a, b| a.cmp(b));

        let ignore_set = ignore_set.clone();
        let exclude = options.exclude.clone();
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            if exclude.as_deref() == Some(entry.path()) {
                tracing::debug!("Skipping destination subtree {}", entry.path().display());
                return false;
            }
            !ignore_set.is_match(entry.file_name())
        });

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Error walking directory: {}", err);
                    discovery.errors += 1;
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue; // stdin entry
            };
            // Unfollowed links: files are processed, linked directories are not entered
            let is_file = if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(target) if target.is_file() => true,
                    Ok(_) => {
                        tracing::debug!("Not descending into symlinked directory {}", entry.path().display());
                        false
                    }
                    Err(err) => {
                        tracing::warn!("Broken symlink {}: {}", entry.path().display(), err);
                        discovery.errors += 1;
                        false
                    }
                }
            } else {
                file_type.is_file()
            };
            if !is_file {
                continue;
            }

            let path = entry.into_path();
            if !seen.insert(identity(&path)) {
                tracing::debug!("Already visited {}", path.display());
                continue;
            }
            discovery.files.push(DiscoveredFile {
                root: root.clone(),
                path,
            });
        }
    }

    tracing::info!("Discovered {} files under {} root(s)", discovery.files.len(), roots.len());
    Ok(discovery)
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
