//! Boundary operations keyed by repository root.
//!
//! Each call opens the repository at `root` (loading its configuration),
//! performs one operation and closes it again. These are the entry points
//! an embedding application calls; the [`Repository`] methods they wrap
//! are available for callers that want to keep a handle.

use std::path::Path;

use crate::error::Result;
use crate::types::{
    CheckoutResult, CommitId, CommitResult, FileEntry, LogEntry, RepoStats, WorkingFileContent,
};
use crate::{CheckoutPlan, Repository};

/// Initialize `root` as a repository. Calling it again is a no-op.
pub fn create_repository(root: impl AsRef<Path>) -> Result<()> {
    Repository::create(root).map(|_| ())
}

pub fn commit(root: impl AsRef<Path>, message: &str) -> Result<CommitResult> {
    Repository::open(root)?.commit(message)
}

pub fn log(root: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    Repository::open(root)?.log()
}

pub fn checkout(root: impl AsRef<Path>, commit_id: CommitId) -> Result<CheckoutResult> {
    Repository::open(root)?.checkout(commit_id)
}

pub fn plan_checkout(root: impl AsRef<Path>, commit_id: CommitId) -> Result<CheckoutPlan> {
    Repository::open(root)?.plan_checkout(commit_id)
}

pub fn get_commit_files(root: impl AsRef<Path>, commit_id: CommitId) -> Result<Vec<FileEntry>> {
    Repository::open(root)?.commit_files(commit_id)
}

pub fn get_blob_content(root: impl AsRef<Path>, hash: &str) -> Result<Vec<u8>> {
    Repository::open(root)?.blob_content(hash)
}

/// Content of a working file; missing files yield `exists: false`.
pub fn get_working_file_content(
    root: impl AsRef<Path>,
    repo_path: &str,
) -> Result<WorkingFileContent> {
    Repository::open(root)?.working_file_content(repo_path)
}

pub fn stats(root: impl AsRef<Path>) -> Result<RepoStats> {
    Repository::open(root)?.stats()
}
