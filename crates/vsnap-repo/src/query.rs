//! Read-only lookups used by the diff and file views.

use std::fs;
use std::io;
use std::path::Path;

use rusqlite::Connection;
use vsnap_cas::{BlobStore, ContentHash};
use vsnap_config::path::resolve_repo_path;

use crate::error::{RepoError, Result};
use crate::types::WorkingFileContent;

/// Stored bytes for a hex hash given by a caller.
pub(crate) fn blob_content(conn: &Connection, hash: &str) -> Result<Vec<u8>> {
    let hash = ContentHash::parse(hash.trim())?;
    Ok(BlobStore::new(conn).get(&hash)?)
}

/// Current on-disk content of a repo path. A path that does not exist is
/// reported as missing rather than as an error.
pub(crate) fn working_file_content(root: &Path, repo_path: &str) -> Result<WorkingFileContent> {
    let mut normalized = repo_path.trim_start_matches("./").to_string();
    if cfg!(windows) {
        normalized = normalized.replace('\\', "/");
    }
    let path = resolve_repo_path(root, &normalized)
        .ok_or_else(|| RepoError::InvalidPath(repo_path.to_string()))?;

    match fs::read(&path) {
        Ok(content) => Ok(WorkingFileContent {
            exists: true,
            content,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(WorkingFileContent::missing()),
        Err(e) => Err(RepoError::fs(path, e)),
    }
}
