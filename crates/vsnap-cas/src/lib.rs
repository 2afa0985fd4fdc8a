//! # vsnap-cas
//!
//! Content hashing and deduplicated blob storage for vsnap.
//!
//! Blobs live in the repository's SQLite metadata store, keyed by the
//! lowercase hex BLAKE3 digest of their content:
//!
//! ```text
//! blobs
//! ├── hash     TEXT PRIMARY KEY   -- 64 hex chars
//! └── content  BLOB NOT NULL
//! ```
//!
//! The store borrows a `rusqlite::Connection`. A `Transaction` derefs to a
//! connection, so blob inserts made while recording a commit become visible
//! together with the commit or not at all.

mod hash;

pub use hash::ContentHash;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, instrument};

/// BLAKE3 hash type (32 bytes)
pub type Blake3Hash = [u8; 32];

/// DDL for the blob table. Safe to run repeatedly.
pub const BLOBS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS blobs (
    hash    TEXT PRIMARY KEY NOT NULL,
    content BLOB NOT NULL
);";

/// Errors that can occur during CAS operations
#[derive(Error, Debug)]
pub enum CasError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Blob not found: {hash}")]
    NotFound { hash: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Invalid content hash: {0:?}")]
    InvalidHash(String),
}

pub type Result<T> = std::result::Result<T, CasError>;

/// Compute the BLAKE3 hash of the given bytes.
#[inline]
pub fn compute_hash(data: &[u8]) -> Blake3Hash {
    *blake3::hash(data).as_bytes()
}

/// Convert a hash to its lowercase hex representation.
#[inline]
pub fn hash_to_hex(hash: &Blake3Hash) -> String {
    hex::encode(hash)
}

/// Parse a hex string into a hash.
pub fn hex_to_hash(hex: &str) -> Option<Blake3Hash> {
    if hex.len() != 64 {
        return None;
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(hex, &mut hash).ok()?;
    Some(hash)
}

/// Deduplicated blob store over a borrowed SQLite connection.
#[derive(Debug, Clone, Copy)]
pub struct BlobStore<'c> {
    conn: &'c Connection,
}

impl<'c> BlobStore<'c> {
    /// Wrap a connection (or an open transaction).
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the `blobs` table if it does not exist yet.
    pub fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(BLOBS_SCHEMA)?;
        Ok(())
    }

    /// Insert `content` under `hash` unless the hash is already present.
    ///
    /// Returns `true` when a new row was created. Existing content is never
    /// overwritten: for a given hash the stored bytes are always the ones
    /// written first.
    #[instrument(skip(self, content), level = "debug", fields(size = content.len()))]
    pub fn put(&self, hash: &ContentHash, content: &[u8]) -> Result<bool> {
        let changed = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO blobs (hash, content) VALUES (?1, ?2)")?
            .execute(params![hash.as_str(), content])?;
        if changed > 0 {
            debug!(hash = %hash.short(), "Inserted new blob");
        }
        Ok(changed > 0)
    }

    /// Hash `content` and store it. Returns the hash and whether it was new.
    pub fn store(&self, content: &[u8]) -> Result<(ContentHash, bool)> {
        let hash = ContentHash::of(content);
        let inserted = self.put(&hash, content)?;
        Ok((hash, inserted))
    }

    /// Retrieve blob content by hash.
    ///
    /// The bytes are re-hashed on read; a row whose content no longer matches
    /// its key is reported as [`CasError::HashMismatch`].
    #[instrument(skip(self), level = "debug")]
    pub fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let content: Option<Vec<u8>> = self
            .conn
            .prepare_cached("SELECT content FROM blobs WHERE hash = ?1")?
            .query_row(params![hash.as_str()], |row| row.get(0))
            .optional()?;

        let content = content.ok_or_else(|| CasError::NotFound {
            hash: hash.to_string(),
        })?;

        let actual = ContentHash::of(&content);
        if actual != *hash {
            return Err(CasError::HashMismatch {
                expected: hash.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(content)
    }

    /// Check if a blob exists.
    pub fn exists(&self, hash: &ContentHash) -> Result<bool> {
        let found = self
            .conn
            .prepare_cached("SELECT 1 FROM blobs WHERE hash = ?1")?
            .query_row(params![hash.as_str()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// All stored hashes in ascending order.
    pub fn hashes(&self) -> Result<Vec<ContentHash>> {
        let mut stmt = self.conn.prepare("SELECT hash FROM blobs ORDER BY hash ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut hashes = Vec::new();
        for row in rows {
            let hex = row?;
            hashes.push(ContentHash::parse(&hex)?);
        }
        Ok(hashes)
    }

    /// Get statistics about the stored blobs.
    pub fn stats(&self) -> Result<BlobStats> {
        let mut stats = BlobStats::default();
        let mut stmt = self.conn.prepare("SELECT length(content) FROM blobs")?;
        let sizes = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        for size in sizes {
            let size = size?.max(0) as u64;
            stats.blob_count += 1;
            stats.total_bytes += size;

            if size < 1024 {
                stats.small_blobs += 1;
            } else if size < 1024 * 1024 {
                stats.medium_blobs += 1;
            } else if size < 100 * 1024 * 1024 {
                stats.large_blobs += 1;
            } else {
                stats.huge_blobs += 1;
            }
        }

        Ok(stats)
    }
}

/// Statistics about the blob store
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStats {
    /// Number of unique blobs stored
    pub blob_count: u64,
    /// Total bytes stored (deduplicated)
    pub total_bytes: u64,
    /// Blobs < 1KB
    pub small_blobs: u64,
    /// Blobs 1KB - 1MB
    pub medium_blobs: u64,
    /// Blobs 1MB - 100MB
    pub large_blobs: u64,
    /// Blobs > 100MB
    pub huge_blobs: u64,
}

impl BlobStats {
    /// Calculate average blob size
    pub fn avg_blob_size(&self) -> u64 {
        if self.blob_count == 0 {
            0
        } else {
            self.total_bytes / self.blob_count
        }
    }
}
