//! # vsnap-config
//!
//! Configuration management for vsnap.
//!
//! Loads configuration from:
//! 1. `~/.vsnap/config.toml` (global)
//! 2. `<repo>/.vsnap/config.toml` (project-local, overrides global key by key)
//! 3. Environment variables (highest priority)
//!
//! There is no process-wide config instance: callers load a [`Config`] for
//! the repository root they are operating on and pass it along.

pub mod logging;
pub mod path;
pub mod testing;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Name of the metadata directory reserved at every repository root.
pub const METADATA_DIR: &str = ".vsnap";

/// SQLite database file inside [`METADATA_DIR`].
pub const DATABASE_FILE: &str = "db.sqlite";

/// Configuration file name, both globally and per project.
pub const CONFIG_FILE: &str = "config.toml";

/// Overrides the directory holding the global config (defaults to `~/.vsnap`).
pub const ENV_CONFIG_HOME: &str = "VSNAP_CONFIG_HOME";
pub const ENV_ON_READ_ERROR: &str = "VSNAP_ON_READ_ERROR";
pub const ENV_SKIP_UNCHANGED: &str = "VSNAP_SKIP_UNCHANGED";
pub const ENV_SCAN_IGNORE: &str = "VSNAP_SCAN_IGNORE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub commit: CommitConfig,
    pub checkout: CheckoutConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load config for a repository root from the standard locations.
    pub fn load(repo_root: Option<&Path>) -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let project = repo_root.map(Self::project_config_path);
        let mut config = Self::load_from(global.as_deref(), project.as_deref())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load and merge explicit config files, without environment overrides.
    ///
    /// Missing files are skipped. Project values replace global values key by
    /// key; tables are merged recursively.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        for path in [global, project].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)?;
            let layer: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
            merge_tables(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|source| ConfigError::Toml {
                path: project.or(global).map(Path::to_path_buf).unwrap_or_default(),
                source,
            })
    }

    /// Global config path: `$VSNAP_CONFIG_HOME/config.toml` or `~/.vsnap/config.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var(ENV_CONFIG_HOME) {
            return Some(PathBuf::from(home).join(CONFIG_FILE));
        }
        dirs::home_dir().map(|h| h.join(METADATA_DIR).join(CONFIG_FILE))
    }

    /// Project config path: `<root>/.vsnap/config.toml`
    pub fn project_config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(METADATA_DIR).join(CONFIG_FILE)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// ignored with a debug message.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(policy) = lookup(ENV_ON_READ_ERROR) {
            match policy.parse() {
                Ok(policy) => self.commit.on_read_error = policy,
                Err(e) => debug!("Ignoring {}: {}", ENV_ON_READ_ERROR, e),
            }
        }
        if let Some(flag) = lookup(ENV_SKIP_UNCHANGED) {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.checkout.skip_unchanged = true,
                "0" | "false" | "no" | "off" => self.checkout.skip_unchanged = false,
                other => debug!("Ignoring {}={:?}", ENV_SKIP_UNCHANGED, other),
            }
        }
        if let Some(patterns) = lookup(ENV_SCAN_IGNORE) {
            self.scan.ignore = patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Working-tree scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extra names (any path component) or `*.ext` patterns to leave out of
    /// snapshots. Ignored files are also never deleted by checkout.
    pub ignore: Vec<String>,
    /// Maximum directory depth below the root
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_depth: 256,
        }
    }
}

/// What a commit does when a scanned file cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Log, report the path as skipped, and keep going
    #[default]
    Skip,
    /// Fail the whole commit and roll it back
    Abort,
}

impl FromStr for ReadErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigError::Invalid(format!(
                "unknown read error policy {:?} (expected \"skip\" or \"abort\")",
                other
            ))),
        }
    }
}

/// Commit configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub on_read_error: ReadErrorPolicy,
}

/// Checkout configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Skip writing files whose on-disk content already has the target hash
    pub skip_unchanged: bool,
}

/// Metadata store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}
