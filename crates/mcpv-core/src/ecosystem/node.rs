//! `package.json` fields used for building and launching Node servers.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ResolutionError;

#[derive(Debug, Default, Deserialize)]
pub struct NodeManifest {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub bin: Option<Value>,
    #[serde(default)]
    pub scripts: Map<String, Value>,
}

impl NodeManifest {
    pub const FILE: &'static str = "package.json";

    pub fn read(dir: &Path) -> Result<Self, ResolutionError> {
        let path = dir.join(Self::FILE);
        let bytes = std::fs::read(&path).map_err(|source| ResolutionError::ManifestIo {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ResolutionError::ManifestParse { path, source })
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.scripts.contains_key(script)
    }

    /// Relative entry script: first `bin` value, else `main`.
    pub fn entry_point(&self) -> Option<&str> {
        let from_bin = match &self.bin {
            Some(Value::Object(map)) => map.values().find_map(Value::as_str),
            Some(Value::String(path)) => Some(path.as_str()),
            _ => None,
        };
        from_bin.or(self.main.as_deref())
    }
}
