//! History queries over the commit tables.

use rusqlite::{params, Connection, OptionalExtension};
use vsnap_cas::ContentHash;

use crate::error::{RepoError, Result};
use crate::types::{CommitId, FileEntry, LogEntry};

/// Commits newest first: by timestamp, then by id for commits recorded in
/// the same millisecond.
pub(crate) fn list(conn: &Connection, limit: Option<usize>) -> Result<Vec<LogEntry>> {
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare_cached(
        "SELECT id, timestamp, message FROM commits
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(LogEntry {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            message: row.get(2)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn get(conn: &Connection, id: CommitId) -> Result<LogEntry> {
    conn.prepare_cached("SELECT id, timestamp, message FROM commits WHERE id = ?1")?
        .query_row(params![id], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                message: row.get(2)?,
            })
        })
        .optional()?
        .ok_or(RepoError::CommitNotFound { id })
}

pub(crate) fn commit_exists(conn: &Connection, id: CommitId) -> Result<bool> {
    let found = conn
        .prepare_cached("SELECT 1 FROM commits WHERE id = ?1")?
        .query_row(params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Path→hash rows of a commit, ordered by path.
pub(crate) fn commit_files(conn: &Connection, id: CommitId) -> Result<Vec<FileEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT path, hash FROM commit_files WHERE commit_id = ?1 ORDER BY path ASC",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut files = Vec::new();
    for row in rows {
        let (path, hash) = row?;
        let hash = ContentHash::parse(&hash).map_err(|_| RepoError::MissingBlob {
            commit_id: id,
            path: path.clone(),
            hash,
        })?;
        files.push(FileEntry { path, hash });
    }
    Ok(files)
}

pub(crate) fn counts(conn: &Connection) -> Result<(u64, u64, Option<CommitId>)> {
    let (commits, latest): (i64, Option<CommitId>) =
        conn.query_row("SELECT COUNT(*), MAX(id) FROM commits", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
    let entries: i64 = conn.query_row("SELECT COUNT(*) FROM commit_files", [], |row| row.get(0))?;
    Ok((commits.max(0) as u64, entries.max(0) as u64, latest))
}
