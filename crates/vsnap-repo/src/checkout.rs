//! Checkout: reconcile the working tree with a recorded commit.
//!
//! A checkout runs in two phases. [`plan`] reads everything it needs
//! (commit rows, every blob, the current tree) and validates it without
//! touching the filesystem; [`apply`] then performs the writes followed by
//! the deletes. A missing blob or an unsafe stored path therefore fails the
//! checkout before any file changes.
//!
//! Deletes that stand in the way of a write (a file where the target needs a
//! directory, or files inside a directory the target replaces with a file)
//! run before the writes, so switching a path between file and directory
//! works.
//!
//! Directories between the root and a written file are never followed as
//! symlinks: a link found there is replaced with a real directory.
//!
//! Filesystem changes are not transactional. Each file is replaced through a
//! temporary sibling and a rename, so an interrupted checkout leaves every
//! file either old or new; running the checkout again finishes the job.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use tracing::instrument;
use walkdir::WalkDir;
use vsnap_cas::{BlobStore, CasError, ContentHash};
use vsnap_config::path::resolve_repo_path;
use vsnap_config::{log_checkout_debug, log_checkout_info, log_checkout_warn};

use crate::error::{RepoError, Result};
use crate::log;
use crate::scan::Scanner;
use crate::types::{CheckoutResult, CommitId};

/// A file the checkout will (re)write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWrite {
    pub repo_path: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub hash: ContentHash,
    /// The working file already holds this content; only set when
    /// `checkout.skip_unchanged` is enabled
    pub unchanged: bool,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// A working file absent from the target commit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDelete {
    pub repo_path: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Must go before the writes because a planned write needs its place
    pub blocks_write: bool,
}

/// Every filesystem change a checkout will make, computed up front.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPlan {
    pub commit_id: CommitId,
    #[serde(skip)]
    pub root: PathBuf,
    pub writes: Vec<PlannedWrite>,
    pub deletes: Vec<PlannedDelete>,
}

impl CheckoutPlan {
    /// Writes that will actually touch the disk.
    pub fn pending_writes(&self) -> usize {
        self.writes.iter().filter(|w| !w.unchanged).count()
    }
}

/// Build the plan for checking out `commit_id` over the tree at `root`.
#[instrument(skip(conn, scanner), level = "debug")]
pub(crate) fn plan(
    conn: &Connection,
    scanner: &Scanner,
    commit_id: CommitId,
    skip_unchanged: bool,
) -> Result<CheckoutPlan> {
    if !log::commit_exists(conn, commit_id)? {
        return Err(RepoError::CommitNotFound { id: commit_id });
    }

    let root = scanner.root();
    let target = log::commit_files(conn, commit_id)?;
    let store = BlobStore::new(conn);

    let current = scanner.scan();
    let on_disk: HashSet<&str> = current.files.iter().map(|f| f.repo_path.as_str()).collect();

    let mut writes = Vec::with_capacity(target.len());
    for entry in target {
        let path = resolve_repo_path(root, &entry.path).ok_or_else(|| RepoError::UnsafePath {
            commit_id,
            path: entry.path.clone(),
        })?;

        let content = match store.get(&entry.hash) {
            Ok(content) => content,
            Err(CasError::NotFound { hash }) => {
                return Err(RepoError::MissingBlob {
                    commit_id,
                    path: entry.path,
                    hash,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let unchanged = skip_unchanged
            && on_disk.contains(entry.path.as_str())
            && fs::read(&path).is_ok_and(|existing| ContentHash::of(&existing) == entry.hash);

        writes.push(PlannedWrite {
            repo_path: entry.path,
            path,
            hash: entry.hash,
            unchanged,
            content,
        });
    }

    let targeted: HashSet<&str> = writes.iter().map(|w| w.repo_path.as_str()).collect();
    let target_dirs: HashSet<&str> = writes
        .iter()
        .flat_map(|w| ancestors(&w.repo_path))
        .collect();
    let deletes = current
        .files
        .iter()
        .filter(|f| !targeted.contains(f.repo_path.as_str()))
        .map(|f| PlannedDelete {
            repo_path: f.repo_path.clone(),
            path: f.path.clone(),
            blocks_write: target_dirs.contains(f.repo_path.as_str())
                || ancestors(&f.repo_path).any(|dir| targeted.contains(dir)),
        })
        .collect();

    Ok(CheckoutPlan {
        commit_id,
        root: root.to_path_buf(),
        writes,
        deletes,
    })
}

/// Proper ancestors of a repo path: `a/b/c` yields `a`, then `a/b`.
fn ancestors(repo_path: &str) -> impl Iterator<Item = &str> {
    repo_path
        .match_indices('/')
        .map(move |(i, _)| &repo_path[..i])
}

#[derive(Default)]
struct DeleteTally {
    deleted: usize,
    failed: usize,
}

impl DeleteTally {
    fn delete(&mut self, delete: &PlannedDelete) {
        match fs::remove_file(&delete.path) {
            Ok(()) => {
                log_checkout_debug!("Deleted file", path = delete.repo_path.as_str());
                self.deleted += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log_checkout_debug!("Already gone", path = delete.repo_path.as_str());
            }
            Err(e) => {
                let error = e.to_string();
                log_checkout_warn!("Failed to delete file", path = delete.repo_path.as_str(), error = error.as_str());
                self.failed += 1;
            }
        }
    }
}

/// Execute a plan. A failed write stops the checkout; failed deletes are
/// logged and counted.
pub(crate) fn apply(plan: &CheckoutPlan) -> Result<CheckoutResult> {
    log_checkout_info!(
        "Applying checkout plan",
        commit_id = plan.commit_id,
        writes = plan.pending_writes(),
        deletes = plan.deletes.len()
    );

    let mut tally = DeleteTally::default();
    for delete in plan.deletes.iter().filter(|d| d.blocks_write) {
        tally.delete(delete);
    }

    let mut files_written = 0;
    let mut files_unchanged = 0;
    for write in &plan.writes {
        if write.unchanged {
            files_unchanged += 1;
            continue;
        }
        clear_emptied_dir(&write.path).map_err(|e| RepoError::fs(&write.path, e))?;
        write_atomic(&plan.root, &write.path, &write.content)
            .map_err(|e| RepoError::fs(&write.path, e))?;
        log_checkout_debug!("Wrote file", path = write.repo_path.as_str(), hash = write.hash.short());
        files_written += 1;
    }

    for delete in plan.deletes.iter().filter(|d| !d.blocks_write) {
        tally.delete(delete);
    }

    Ok(CheckoutResult {
        commit_id: plan.commit_id,
        files_written,
        files_deleted: tally.deleted,
        files_unchanged,
        delete_failures: tally.failed,
        summary: format!(
            "Successfully checked out commit {}. Wrote {} files, deleted {} files.",
            plan.commit_id, files_written, tally.deleted
        ),
    })
}

/// Remove the directory tree at `path` if only directories are left in it.
/// Anything else inside (ignored or untracked entries) is left alone and
/// reported as an error.
fn clear_emptied_dir(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        _ => return Ok(()),
    }

    for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not tracked and blocks the checkout", entry.path().display()),
            ));
        }
        fs::remove_dir(entry.path())?;
    }
    Ok(())
}

/// Create the directories between `root` and `dir` without following
/// symlinks. A symlink on the way is replaced with a real directory, and a
/// regular file on the way is an error.
fn ensure_real_dirs(root: &Path, dir: &Path) -> io::Result<()> {
    let relative = dir.strip_prefix(root).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "path is outside the repository root")
    })?;

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let shown = current.display().to_string();
                log_checkout_warn!("Replacing symlink with a directory", path = shown.as_str());
                fs::remove_file(&current).or_else(|_| fs::remove_dir(&current))?;
                fs::create_dir(&current)?;
            }
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", current.display()),
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Replace `path` (below `root`) with `data` via a temporary sibling and a
/// rename. Permissions of an existing file are carried over.
fn write_atomic(root: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    ensure_real_dirs(root, parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = parent.join(format!(
        ".{}.{}.vsnap-tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let existing = fs::symlink_metadata(path).ok().filter(|m| m.is_file());

    let _ = fs::remove_file(&temp_path);
    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        if let Some(meta) = &existing {
            fs::set_permissions(&temp_path, meta.permissions())?;
        }
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        // Clean up orphaned temp file
        let _ = fs::remove_file(&temp_path);
    }
    result
}
