//! # vsnap-repo
//!
//! Local snapshot repository: every commit captures the whole working tree,
//! and checkout reconciles the tree with any recorded commit.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── .vsnap/
//! │   ├── db.sqlite     commits, commit_files, blobs
//! │   └── config.toml   optional project config
//! └── ...               working tree
//! ```
//!
//! A [`Repository`] holds only the root and the loaded [`Config`]; each
//! operation opens its own SQLite connection.

pub mod api;
pub mod checkout;
pub mod commit;
pub mod db;
pub mod error;
pub mod ignore;
mod log;
mod query;
pub mod scan;
pub mod types;

pub use checkout::{CheckoutPlan, PlannedDelete, PlannedWrite};
pub use error::{ErrorKind, RepoError, Result};
pub use scan::{ScanOutcome, ScannedFile, Scanner};
pub use types::{
    CheckoutResult, CommitId, CommitResult, FileEntry, LogEntry, RepoStats, SkippedEntry,
    WorkingFileContent,
};

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::instrument;
use vsnap_cas::BlobStore;
use vsnap_config::{log_checkout_info, log_store_info, Config, DATABASE_FILE, METADATA_DIR};

/// Handle on a repository root.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    config: Config,
}

impl Repository {
    /// Initialize a repository at `root`, or open it if it already exists.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = canonical_root(root.as_ref())?;
        let config = Config::load(Some(root.as_path()))?;
        Self::create_with_config(root, config)
    }

    /// Like [`Repository::create`] with an explicit configuration.
    pub fn create_with_config(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let repo = Self {
            root: canonical_root(root.as_ref())?,
            config,
        };

        let metadata_dir = repo.metadata_dir();
        fs::create_dir_all(&metadata_dir).map_err(|e| RepoError::fs(&metadata_dir, e))?;

        let conn = db::open(&repo.db_path(), &repo.config.storage)?;
        db::ensure_schema(&conn)?;

        let root_display = repo.root.display().to_string();
        log_store_info!("Repository ready", root = root_display.as_str());
        Ok(repo)
    }

    /// Open an initialized repository, loading config from the standard
    /// locations.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = canonical_root(root.as_ref())?;
        let config = Config::load(Some(root.as_path()))?;
        Self::open_with_config(root, config)
    }

    pub fn open_with_config(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let repo = Self {
            root: canonical_root(root.as_ref())?,
            config,
        };
        let db_path = repo.db_path();
        if !db_path.is_file() {
            return Err(RepoError::RepositoryNotFound { path: db_path });
        }
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn db_path(&self) -> PathBuf {
        self.metadata_dir().join(DATABASE_FILE)
    }

    /// Scanner configured for this repository.
    pub fn scanner(&self) -> Scanner {
        Scanner::with_config(&self.root, &self.config.scan)
    }

    /// Read-write connection with the schema in place.
    pub fn connect(&self) -> Result<Connection> {
        let conn = db::open(&self.db_path(), &self.config.storage)?;
        db::ensure_schema(&conn)?;
        Ok(conn)
    }

    /// Read-only connection. Fails with `RepositoryNotFound` if the schema
    /// has never been created.
    pub fn connect_read_only(&self) -> Result<Connection> {
        let conn = db::open_read_only(&self.db_path(), &self.config.storage)?;
        if !db::has_schema(&conn)? {
            return Err(RepoError::RepositoryNotFound {
                path: self.db_path(),
            });
        }
        Ok(conn)
    }

    /// Snapshot the entire working tree.
    #[instrument(skip(self), level = "debug")]
    pub fn commit(&self, message: &str) -> Result<CommitResult> {
        let scan = self.scanner().scan();
        let mut conn = self.connect()?;
        commit::record_snapshot(&mut conn, scan, message, self.config.commit.on_read_error)
    }

    /// Full history, newest first.
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        log::list(&self.connect_read_only()?, None)
    }

    /// The newest `limit` history entries.
    pub fn log_limited(&self, limit: usize) -> Result<Vec<LogEntry>> {
        log::list(&self.connect_read_only()?, Some(limit))
    }

    pub fn get_commit(&self, id: CommitId) -> Result<LogEntry> {
        log::get(&self.connect_read_only()?, id)
    }

    /// Files recorded in a commit, ordered by path.
    pub fn commit_files(&self, id: CommitId) -> Result<Vec<FileEntry>> {
        let conn = self.connect_read_only()?;
        if !log::commit_exists(&conn, id)? {
            return Err(RepoError::CommitNotFound { id });
        }
        log::commit_files(&conn, id)
    }

    /// Compute what a checkout of `id` would do, without changing anything.
    pub fn plan_checkout(&self, id: CommitId) -> Result<CheckoutPlan> {
        let conn = self.connect_read_only()?;
        checkout::plan(
            &conn,
            &self.scanner(),
            id,
            self.config.checkout.skip_unchanged,
        )
    }

    /// Make the working tree match commit `id` exactly.
    #[instrument(skip(self), level = "debug")]
    pub fn checkout(&self, id: CommitId) -> Result<CheckoutResult> {
        let plan = self.plan_checkout(id)?;
        let result = checkout::apply(&plan)?;
        log_checkout_info!(
            "Checkout complete",
            commit_id = id,
            written = result.files_written,
            deleted = result.files_deleted,
            unchanged = result.files_unchanged,
            delete_failures = result.delete_failures
        );
        Ok(result)
    }

    /// Raw content of a stored blob.
    pub fn blob_content(&self, hash: &str) -> Result<Vec<u8>> {
        query::blob_content(&self.connect_read_only()?, hash)
    }

    /// Current content of a working file.
    pub fn working_file_content(&self, repo_path: &str) -> Result<WorkingFileContent> {
        query::working_file_content(&self.root, repo_path)
    }

    pub fn stats(&self) -> Result<RepoStats> {
        let conn = self.connect_read_only()?;
        let (commits, tracked_entries, latest_commit) = log::counts(&conn)?;
        let blobs = BlobStore::new(&conn).stats()?;
        Ok(RepoStats {
            commits,
            tracked_entries,
            latest_commit,
            blobs,
        })
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(root).map_err(|e| RepoError::fs(root, e))?;
    if !canonical.is_dir() {
        return Err(RepoError::InvalidPath(root.display().to_string()));
    }
    Ok(canonical)
}
