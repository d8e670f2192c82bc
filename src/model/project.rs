//! Project descriptor (read from an external store; the core never owns
//! project persistence, it only reads and writes the fields described here).

use serde::{Deserialize, Serialize};

use crate::model::call_graph::Algorithm;

/// One entry-point specification: `"<relative_file>:<function_name>"`, or the
/// sentinel `"*"` meaning "every exported function is an entry".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPointSpec {
    Named { file: String, function: String },
    AllExported,
}

impl EntryPointSpec {
    /// Parse `"<file>:<func>"` or `"*"`. Forward slashes only, per §6.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "*" {
            return Some(EntryPointSpec::AllExported);
        }
        let (file, function) = raw.rsplit_once(':')?;
        if file.is_empty() || function.is_empty() {
            return None;
        }
        Some(EntryPointSpec::Named {
            file: file.replace('\\', "/"),
            function: function.to_string(),
        })
    }

    pub fn to_raw(&self) -> String {
        match self {
            EntryPointSpec::Named { file, function } => format!("{file}:{function}"),
            EntryPointSpec::AllExported => "*".to_string(),
        }
    }
}

/// Patterns used by C3/C4 to ignore files. Matched the way `.gitignore`
/// patterns are: a trailing `/` anchors to a directory prefix, anything else
/// is matched against the path and the basename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludePatterns(pub Vec<String>);

impl Default for ExcludePatterns {
    fn default() -> Self {
        ExcludePatterns(vec!["vendor/".to_string(), "*_test.go".to_string()])
    }
}

impl ExcludePatterns {
    /// True if `relative_path` (forward-slash, project-relative) matches any
    /// configured pattern.
    pub fn matches(&self, relative_path: &str) -> bool {
        use std::path::Path;

        let basename = Path::new(relative_path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(relative_path);

        for pattern in &self.0 {
            if let Some(prefix) = pattern.strip_suffix('/') {
                if relative_path == prefix
                    || relative_path.starts_with(&format!("{prefix}/"))
                    || relative_path.split('/').any(|seg| seg == prefix)
                {
                    return true;
                }
                continue;
            }

            let Ok(glob) = globset::Glob::new(pattern) else {
                continue;
            };
            let matcher = glob.compile_matcher();
            if matcher.is_match(basename) || matcher.is_match(relative_path) {
                return true;
            }
        }
        false
    }
}

/// A project, as read from an external project store. The core treats this
/// as an input; it never creates or deletes project rows itself, it only
/// persists a descriptor on first successful generation (see C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier derived from the normalized remote URL (or absolute
    /// path fallback). See [`crate::entrypoints::normalize_remote_url`].
    pub id: String,
    pub name: String,
    pub remote_url: Option<String>,
    pub local_paths: Vec<String>,
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub exclude: ExcludePatterns,
    #[serde(default)]
    pub algorithm: Algorithm,
    pub integration_test_dir: Option<String>,
    pub integration_test_tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_sentinel() {
        assert_eq!(
            EntryPointSpec::parse("cmd/server/main.go:main"),
            Some(EntryPointSpec::Named {
                file: "cmd/server/main.go".to_string(),
                function: "main".to_string(),
            })
        );
        assert_eq!(EntryPointSpec::parse("*"), Some(EntryPointSpec::AllExported));
        assert_eq!(EntryPointSpec::parse("no-colon-here"), None);
    }

    #[test]
    fn exclude_matches_directory_prefix_and_glob() {
        let ex = ExcludePatterns::default();
        assert!(ex.matches("vendor/foo/bar.go"));
        assert!(ex.matches("pkg/foo_test.go"));
        assert!(!ex.matches("pkg/foo.go"));
    }
}
