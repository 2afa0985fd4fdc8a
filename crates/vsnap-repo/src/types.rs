//! Request/response types exchanged across the repository boundary.
//!
//! Everything here serializes to camelCase JSON so an embedding UI can pass
//! results through unchanged.

use std::borrow::Cow;
use std::path::PathBuf;

use serde::{Serialize, Serializer};
use vsnap_cas::{BlobStats, ContentHash};

/// Commit identifier, assigned by the metadata store in increasing order.
pub type CommitId = i64;

/// One line of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: CommitId,
    /// ISO-8601 UTC creation time
    pub timestamp: String,
    pub message: String,
}

/// State of one path inside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Repo path: relative to the root, `/`-separated
    pub path: String,
    pub hash: ContentHash,
}

/// A file or directory left out of a snapshot, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub id: CommitId,
    pub timestamp: String,
    pub summary: String,
    /// Captured files in repo path order
    pub files: Vec<FileEntry>,
    /// Blobs this commit added to the store (content not seen before)
    pub new_blobs: usize,
    /// Entries the scanner or the file reader had to leave out
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub commit_id: CommitId,
    pub files_written: usize,
    pub files_deleted: usize,
    /// Writes skipped because the file already had the target content
    pub files_unchanged: usize,
    /// Deletes that failed for a reason other than the file being gone
    pub delete_failures: usize,
    pub summary: String,
}

/// On-disk content of a working file. A missing file is reported as
/// `exists: false` with empty content rather than as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingFileContent {
    pub exists: bool,
    #[serde(serialize_with = "lossy_utf8")]
    pub content: Vec<u8>,
}

impl WorkingFileContent {
    pub fn missing() -> Self {
        Self {
            exists: false,
            content: Vec::new(),
        }
    }

    /// Content as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

fn lossy_utf8<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// Repository-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStats {
    pub commits: u64,
    /// Total (commit, path) rows across history
    pub tracked_entries: u64,
    pub latest_commit: Option<CommitId>,
    pub blobs: BlobStats,
}
