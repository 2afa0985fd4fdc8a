//! Path normalization utilities.
//!
//! Paths recorded in a snapshot are *repo paths*: relative to the repository
//! root, `/`-separated on every platform, never containing `.`/`..`
//! components and never pointing into the metadata directory. Everything
//! that turns an on-disk path into a repo path, or back, goes through here.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::METADATA_DIR;

/// Resolve a repository root to an absolute, symlink-free path.
///
/// # Example
/// ```ignore
/// let root = normalize_root(".").unwrap();
/// assert!(root.is_absolute());
/// ```
pub fn normalize_root(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path.canonicalize()
        .with_context(|| format!("Failed to resolve repository root: {}", path.display()))
}

/// Convert an absolute path under `root` into a repo path.
///
/// Returns `None` when the path is not below `root`, is the root itself, or
/// has a component that is not valid UTF-8.
///
/// # Example
/// ```ignore
/// let rel = to_repo_path("/work", "/work/src/main.rs");
/// assert_eq!(rel.as_deref(), Some("src/main.rs"));
/// ```
pub fn to_repo_path(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Option<String> {
    let relative = path.as_ref().strip_prefix(root.as_ref()).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            _ => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Resolve a repo path against `root`.
///
/// Returns `None` for anything that could land outside the working tree or
/// inside the metadata directory: empty paths, absolute paths, `.`/`..`
/// components, or a leading `.vsnap` component. Each `/`-separated part must
/// be a single native path component, so `\` is an ordinary file name
/// character on Unix and a separator (rejected) on Windows, matching what
/// [`to_repo_path`] records on each platform.
pub fn resolve_repo_path(root: impl AsRef<Path>, repo_path: &str) -> Option<PathBuf> {
    if repo_path.is_empty() || repo_path.starts_with('/') {
        return None;
    }

    let mut resolved = root.as_ref().to_path_buf();
    for (i, part) in repo_path.split('/').enumerate() {
        if part.is_empty() || part == "." || part == ".." {
            return None;
        }
        if i == 0 && part == METADATA_DIR {
            return None;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => resolved.push(part),
            _ => return None,
        }
    }
    Some(resolved)
}
