//! Commit: snapshot the whole working tree in one transaction.

use std::fs;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, Transaction};
use tracing::instrument;
use vsnap_cas::BlobStore;
use vsnap_config::{log_commit_debug, log_commit_error, log_commit_info, log_commit_warn, ReadErrorPolicy};

use crate::error::{RepoError, Result};
use crate::scan::{ScanOutcome, ScannedFile};
use crate::types::{CommitId, CommitResult, FileEntry, SkippedEntry};

/// Current time as stored in `commits.timestamp`, e.g. `2026-10-18T09:12:44.123Z`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rows written by a commit before the transaction is committed.
struct Recorded {
    id: CommitId,
    files: Vec<FileEntry>,
    new_blobs: usize,
    skipped: Vec<SkippedEntry>,
}

/// Record `scan` as a new commit. Either every row becomes visible or none.
#[instrument(skip(conn, scan), level = "debug", fields(files = scan.files.len()))]
pub(crate) fn record_snapshot(
    conn: &mut Connection,
    scan: ScanOutcome,
    message: &str,
    on_read_error: ReadErrorPolicy,
) -> Result<CommitResult> {
    let timestamp = now_timestamp();
    let tx = conn.transaction().map_err(RepoError::Transaction)?;

    let recorded = match write_rows(&tx, &scan.files, &timestamp, message, on_read_error) {
        Ok(recorded) => recorded,
        Err(e) => {
            let error = e.to_string();
            log_commit_error!("Commit failed, rolling back", error = error.as_str());
            if let Err(rollback) = tx.rollback() {
                let rollback = rollback.to_string();
                log_commit_warn!("Rollback reported an error", error = rollback.as_str());
            }
            return Err(e.in_transaction());
        }
    };

    tx.commit().map_err(RepoError::Transaction)?;

    let mut skipped = scan.skipped;
    skipped.extend(recorded.skipped);

    log_commit_info!(
        "Commit recorded",
        commit_id = recorded.id,
        files = recorded.files.len(),
        new_blobs = recorded.new_blobs,
        skipped = skipped.len()
    );

    Ok(CommitResult {
        id: recorded.id,
        summary: format!(
            "Commit {} successful. Snapshot includes {} file(s).",
            recorded.id,
            recorded.files.len()
        ),
        timestamp,
        files: recorded.files,
        new_blobs: recorded.new_blobs,
        skipped,
    })
}

fn write_rows(
    tx: &Transaction<'_>,
    files: &[ScannedFile],
    timestamp: &str,
    message: &str,
    on_read_error: ReadErrorPolicy,
) -> Result<Recorded> {
    tx.execute(
        "INSERT INTO commits (timestamp, message) VALUES (?1, ?2)",
        params![timestamp, message],
    )?;
    let id = tx.last_insert_rowid();

    let blobs = BlobStore::new(tx);
    let mut insert = tx.prepare_cached(
        "INSERT INTO commit_files (commit_id, path, hash) VALUES (?1, ?2, ?3)",
    )?;

    let mut recorded = Recorded {
        id,
        files: Vec::with_capacity(files.len()),
        new_blobs: 0,
        skipped: Vec::new(),
    };

    for file in files {
        let content = match fs::read(&file.path) {
            Ok(content) => content,
            Err(e) => match on_read_error {
                ReadErrorPolicy::Skip => {
                    let reason = e.to_string();
                    log_commit_warn!("Skipping unreadable file", path = file.repo_path.as_str(), error = reason.as_str());
                    recorded.skipped.push(SkippedEntry {
                        path: file.path.clone(),
                        reason,
                    });
                    continue;
                }
                ReadErrorPolicy::Abort => return Err(RepoError::fs(&file.path, e)),
            },
        };

        let (hash, inserted) = blobs.store(&content)?;
        if inserted {
            recorded.new_blobs += 1;
        }
        insert.execute(params![id, file.repo_path, hash.as_str()])?;
        log_commit_debug!("Captured file", path = file.repo_path.as_str(), hash = hash.short(), new_blob = inserted);

        recorded.files.push(FileEntry {
            path: file.repo_path.clone(),
            hash,
        });
    }

    Ok(recorded)
}
