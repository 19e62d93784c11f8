//! Repository location parsing.

use serde::{Deserialize, Serialize};

/// Specification for a git source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSpec {
    /// Repository URL or local path handed to git
    pub repo_url: String,
}

impl GitSpec {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
        }
    }

    /// Parse a repository string into a GitSpec.
    ///
    /// Supports formats:
    /// - `https://github.com/org/repo` (and any other URL or path git accepts)
    /// - `git:https://github.com/org/repo`
    /// - `github:org/repo`
    pub fn parse(source: &str) -> Self {
        let raw = source.trim();
        let raw = raw.strip_prefix("git:").unwrap_or(raw);
        match raw.strip_prefix("github:") {
            Some(shorthand) => Self::new(format!(
                "https://github.com/{}",
                shorthand.trim_matches('/')
            )),
            None => Self::new(raw),
        }
    }
}
