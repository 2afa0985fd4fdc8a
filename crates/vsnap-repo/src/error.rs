//! Repository error taxonomy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vsnap_cas::CasError;

use crate::types::CommitId;

/// Coarse classification of a [`RepoError`], for callers that only need to
/// know what went wrong, not where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Commit, repository metadata or blob does not exist
    NotFound,
    /// Caller passed a malformed hash or an unsafe path
    InvalidInput,
    /// Host filesystem read/write/delete failure
    FileSystem,
    /// Persisted metadata is inconsistent
    Integrity,
    /// The atomic commit write failed and was rolled back
    Transaction,
    /// Any other metadata store failure
    Storage,
    /// Configuration could not be loaded
    Config,
}

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Repository database not found at {}. Has the repo been initialized?", path.display())]
    RepositoryNotFound { path: PathBuf },

    #[error("Commit ID {id} not found")]
    CommitNotFound { id: CommitId },

    #[error("Blob content not found for hash {hash}")]
    BlobNotFound { hash: String },

    #[error("Invalid content hash: {0:?}")]
    InvalidHash(String),

    #[error("Invalid repository path: {0:?}")]
    InvalidPath(String),

    #[error("File system error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Blob content not found for hash {hash} (associated with path {path} in commit {commit_id})")]
    MissingBlob {
        commit_id: CommitId,
        path: String,
        hash: String,
    },

    #[error("Blob {expected} is corrupted: stored content hashes to {actual}")]
    CorruptBlob { expected: String, actual: String },

    #[error("Commit {commit_id} records an unsafe path: {path:?}")]
    UnsafePath { commit_id: CommitId, path: String },

    #[error("Commit transaction failed and was rolled back: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("Metadata store error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] vsnap_config::ConfigError),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::RepositoryNotFound { .. }
            | RepoError::CommitNotFound { .. }
            | RepoError::BlobNotFound { .. } => ErrorKind::NotFound,
            RepoError::InvalidHash(_) | RepoError::InvalidPath(_) => ErrorKind::InvalidInput,
            RepoError::FileSystem { .. } => ErrorKind::FileSystem,
            RepoError::MissingBlob { .. }
            | RepoError::CorruptBlob { .. }
            | RepoError::UnsafePath { .. } => ErrorKind::Integrity,
            RepoError::Transaction(_) => ErrorKind::Transaction,
            RepoError::Storage(_) => ErrorKind::Storage,
            RepoError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RepoError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Reclassify a store failure that happened inside the commit transaction.
    pub(crate) fn in_transaction(self) -> Self {
        match self {
            RepoError::Storage(e) => RepoError::Transaction(e),
            other => other,
        }
    }
}

impl From<CasError> for RepoError {
    fn from(err: CasError) -> Self {
        match err {
            CasError::Sqlite(e) => RepoError::Storage(e),
            CasError::NotFound { hash } => RepoError::BlobNotFound { hash },
            CasError::HashMismatch { expected, actual } => {
                RepoError::CorruptBlob { expected, actual }
            }
            CasError::InvalidHash(hash) => RepoError::InvalidHash(hash),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;
