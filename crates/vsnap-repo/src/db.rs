//! Metadata store: schema and connections.
//!
//! ```text
//! commits       (id INTEGER PK AUTOINCREMENT, timestamp TEXT, message TEXT)
//! blobs         (hash TEXT PK, content BLOB)              -- vsnap-cas
//! commit_files  (commit_id -> commits.id, path TEXT, hash -> blobs.hash)
//!               PRIMARY KEY (commit_id, path)
//! ```

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use vsnap_cas::BlobStore;
use vsnap_config::StorageConfig;

use crate::error::Result;

/// DDL for the commit tables. Safe to run repeatedly.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS commits (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    message   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS commit_files (
    commit_id INTEGER NOT NULL REFERENCES commits(id),
    path      TEXT NOT NULL,
    hash      TEXT NOT NULL REFERENCES blobs(hash),
    PRIMARY KEY (commit_id, path)
);";

/// Open a read-write connection, creating the database file if needed.
pub fn open(db_path: &Path, storage: &StorageConfig) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    Ok(conn)
}

/// Open an existing database for reading only.
pub fn open_read_only(db_path: &Path, storage: &StorageConfig) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    Ok(conn)
}

/// Create every table if missing.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    BlobStore::create_schema(conn)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Whether the commit tables exist, without creating them.
pub fn has_schema(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('commits', 'commit_files', 'blobs')",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 3)
}
