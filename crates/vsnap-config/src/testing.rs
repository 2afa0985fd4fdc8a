//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated working tree (repository root)
//! - An isolated global config directory
//! - Helpers to create, read and remove working files
//!
//! # Usage
//!
//! ```ignore
//! use vsnap_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     env.create_file("src/main.rs", b"fn main() {}").unwrap();
//!     // env.project_root and env.config_home are isolated per test
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::{DATABASE_FILE, ENV_CONFIG_HOME, METADATA_DIR};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Repository root for the test
    pub project_root: PathBuf,
    /// Stand-in for `~/.vsnap`, so a developer's global config never leaks in
    pub config_home: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().canonicalize()?;

        let project_root = root.join("project");
        let config_home = root.join("config-home");

        std::fs::create_dir_all(&project_root)?;
        std::fs::create_dir_all(&config_home)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_root,
            config_home,
            test_id,
        })
    }

    /// Metadata directory of the test repository
    pub fn metadata_dir(&self) -> PathBuf {
        self.project_root.join(METADATA_DIR)
    }

    /// SQLite database path of the test repository
    pub fn db_path(&self) -> PathBuf {
        self.metadata_dir().join(DATABASE_FILE)
    }

    /// Create a test file with content
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a test directory
    pub fn create_dir(&self, relative_path: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Read a working file
    pub fn read_file(&self, relative_path: &str) -> anyhow::Result<Vec<u8>> {
        Ok(std::fs::read(self.project_root.join(relative_path))?)
    }

    /// Remove a working file
    pub fn remove_file(&self, relative_path: &str) -> anyhow::Result<()> {
        std::fs::remove_file(self.project_root.join(relative_path))?;
        Ok(())
    }

    /// Whether a working file exists
    pub fn exists(&self, relative_path: &str) -> bool {
        self.project_root.join(relative_path).exists()
    }

    /// Write a project-level `config.toml`
    pub fn write_project_config(&self, toml: &str) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(self.metadata_dir())?;
        let path = crate::Config::project_config_path(&self.project_root);
        std::fs::write(&path, toml)?;
        Ok(path)
    }

    /// Environment variables for spawning `vsnap` against this environment.
    pub fn cli_env(&self) -> Vec<(String, String)> {
        vec![
            (
                ENV_CONFIG_HOME.to_string(),
                self.config_home.to_string_lossy().into_owned(),
            ),
            ("NO_COLOR".to_string(), "1".to_string()),
        ]
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
