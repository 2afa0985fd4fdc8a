//! Working-tree scanner.
//!
//! Enumerates the regular files under a repository root. The metadata
//! directory is pruned at every depth, symlinks are neither followed nor
//! recorded, and special files are skipped. Per-entry errors never abort
//! the walk: they are logged and reported in [`ScanOutcome::skipped`].

use std::path::{Path, PathBuf};

use tracing::instrument;
use vsnap_config::path::to_repo_path;
use vsnap_config::{log_scan_debug, log_scan_warn, ScanConfig, METADATA_DIR};
use walkdir::{DirEntry, WalkDir};

use crate::ignore::IgnoreMatcher;
use crate::types::SkippedEntry;

/// A regular file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated
    pub repo_path: String,
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Files sorted by repo path
    pub files: Vec<ScannedFile>,
    pub skipped: Vec<SkippedEntry>,
}

/// Working-tree scanner
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    ignore: IgnoreMatcher,
    max_depth: usize,
}

impl Scanner {
    /// Create a scanner for `root` with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &ScanConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: &ScanConfig) -> Self {
        Self {
            root: root.into(),
            ignore: IgnoreMatcher::with_patterns(&config.ignore),
            max_depth: config.max_depth,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries pruned before descending: metadata directories and ignored paths.
    fn should_descend(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if entry.file_type().is_dir() && entry.file_name() == METADATA_DIR {
            return false;
        }
        if self.ignore.is_empty() {
            return true;
        }
        match entry.path().strip_prefix(&self.root) {
            Ok(relative) => !self.ignore.should_ignore(relative),
            Err(_) => true,
        }
    }

    /// Walk the tree and collect regular files.
    #[instrument(skip(self), level = "debug", fields(root = %self.root.display()))]
    pub fn scan(&self) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_descend(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    let reason = e.to_string();
                    let shown = path.display().to_string();
                    log_scan_warn!("Skipping unreadable entry", path = shown.as_str(), error = reason.as_str());
                    outcome.skipped.push(SkippedEntry { path, reason });
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if entry.depth() > 0 && entry.depth() == self.max_depth && has_entries(entry.path()) {
                    let path = entry.into_path();
                    let shown = path.display().to_string();
                    log_scan_warn!("Not descending past scan.max_depth", path = shown.as_str(), max_depth = self.max_depth);
                    outcome.skipped.push(SkippedEntry {
                        path,
                        reason: format!("directory contents are deeper than scan.max_depth ({})", self.max_depth),
                    });
                }
                continue;
            }
            if !file_type.is_file() {
                let shown = entry.path().display().to_string();
                if file_type.is_symlink() {
                    log_scan_debug!("Skipping symlink", path = shown.as_str());
                } else {
                    log_scan_debug!("Skipping special file", path = shown.as_str());
                }
                continue;
            }

            match to_repo_path(&self.root, entry.path()) {
                Some(repo_path) => outcome.files.push(ScannedFile {
                    path: entry.into_path(),
                    repo_path,
                }),
                None => {
                    let path = entry.into_path();
                    let shown = path.display().to_string();
                    log_scan_warn!("Skipping path that is not valid UTF-8", path = shown.as_str());
                    outcome.skipped.push(SkippedEntry {
                        path,
                        reason: "path is not valid UTF-8".to_string(),
                    });
                }
            }
        }

        outcome.files.sort_by(|a, b| a.repo_path.cmp(&b.repo_path));
        log_scan_debug!(
            "Scan complete",
            files = outcome.files.len(),
            skipped = outcome.skipped.len()
        );
        outcome
    }
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_some())
}

/// Scan `root` with default settings.
pub fn scan(root: impl Into<PathBuf>) -> ScanOutcome {
    Scanner::new(root).scan()
}
