//! Structured logging utilities for vsnap components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use vsnap_config::{log_commit_info, log_scan_debug};
//!
//! log_commit_info!("Commit recorded", commit_id = 7, files = 12);
//! log_scan_debug!("Skipping symlink");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const SCAN: &'static str = "SCAN";
    pub const STORE: &'static str = "STORE";
    pub const COMMIT: &'static str = "COMMIT";
    pub const CHECKOUT: &'static str = "CHECKOUT";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map a `-v` count to a level: none is `Warn`, each flag adds one step.
    pub fn from_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === SCAN logging macros ===

#[macro_export]
macro_rules! log_scan_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::SCAN, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_scan_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::SCAN, $($key = $value,)* $msg)
    };
}

// === STORE logging macros ===

#[macro_export]
macro_rules! log_store_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::STORE, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_store_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::STORE, $($key = $value,)* $msg)
    };
}

// === COMMIT logging macros ===

#[macro_export]
macro_rules! log_commit_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = $crate::logging::Component::COMMIT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_commit_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::COMMIT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_commit_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::COMMIT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_commit_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::COMMIT, $($key = $value,)* $msg)
    };
}

// === CHECKOUT logging macros ===

#[macro_export]
macro_rules! log_checkout_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::CHECKOUT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_checkout_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::CHECKOUT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_checkout_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::CHECKOUT, $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::CLI, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cli_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::CLI, $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
///
/// `VSNAP_LOG`, then `RUST_LOG`, take precedence over `level` when set.
/// Call this once at application startup; later calls are no-ops.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("VSNAP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
