//! Build ecosystem classification for fetched source trees.

pub mod node;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language/build-tool family of a source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Node,
    Python,
    Go,
    Rust,
    Unknown,
}

/// Marker files in tie-break order. A tree with several markers takes the
/// first one listed here.
const MARKERS: [(&str, Ecosystem); 4] = [
    ("package.json", Ecosystem::Node),
    ("requirements.txt", Ecosystem::Python),
    ("go.mod", Ecosystem::Go),
    ("Cargo.toml", Ecosystem::Rust),
];

impl Ecosystem {
    /// Classify `dir` by the first marker file present.
    pub fn detect(dir: &Path) -> Self {
        MARKERS
            .iter()
            .find(|(marker, _)| dir.join(marker).exists())
            .map(|(_, ecosystem)| *ecosystem)
            .unwrap_or(Ecosystem::Unknown)
    }

    /// Manifest file that identified this ecosystem.
    pub fn manifest(self) -> Option<&'static str> {
        MARKERS
            .iter()
            .find(|(_, ecosystem)| *ecosystem == self)
            .map(|(marker, _)| *marker)
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ecosystem::Node => "node",
            Ecosystem::Python => "python",
            Ecosystem::Go => "go",
            Ecosystem::Rust => "rust",
            Ecosystem::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
