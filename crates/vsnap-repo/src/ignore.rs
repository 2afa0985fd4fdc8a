//! Ignore patterns for the working-tree scan.
//!
//! Patterns come from the `[scan] ignore` config list.

use std::path::Path;

/// Ignore pattern matcher
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<String>,
}

impl IgnoreMatcher {
    /// Create a matcher with custom patterns
    pub fn with_patterns(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.trim().trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Check if a path relative to the repository root should be ignored.
    ///
    /// `*.ext` matches the final component's extension; any other pattern
    /// matches a whole path component at any depth.
    pub fn should_ignore(&self, relative: &Path) -> bool {
        for pattern in &self.patterns {
            if let Some(suffix) = pattern.strip_prefix("*.") {
                if relative
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy() == suffix)
                {
                    return true;
                }
            } else if relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy() == *pattern)
            {
                return true;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Get the patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> IgnoreMatcher {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        IgnoreMatcher::with_patterns(&owned)
    }

    #[test]
    fn test_name_matches_any_component() {
        let m = matcher(&["node_modules"]);
        assert!(m.should_ignore(Path::new("node_modules")));
        assert!(m.should_ignore(Path::new("web/node_modules/react/index.js")));
        assert!(!m.should_ignore(Path::new("web/node_modules_backup/a.js")));
    }

    #[test]
    fn test_extension_glob() {
        let m = matcher(&["*.log"]);
        assert!(m.should_ignore(Path::new("build.log")));
        assert!(m.should_ignore(Path::new("logs/today.log")));
        assert!(!m.should_ignore(Path::new("catalog")));
        assert!(!m.should_ignore(Path::new("build.log.txt")));
    }

    #[test]
    fn test_trailing_slash_and_blank_patterns() {
        let m = matcher(&["target/", "  ", ""]);
        assert_eq!(m.patterns(), ["target".to_string()]);
        assert!(m.should_ignore(Path::new("target/debug/app")));
    }

    #[test]
    fn test_empty_matcher_ignores_nothing() {
        let m = IgnoreMatcher::default();
        assert!(m.is_empty());
        assert!(!m.should_ignore(Path::new("anything.txt")));
    }
}
