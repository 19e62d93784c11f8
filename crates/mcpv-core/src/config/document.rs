//! Typed view over an agent's JSON config file.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::AgentError;

pub const DEFAULT_SERVERS_KEY: &str = "mcpServers";

/// The servers mapping of an agent config, plus every other top-level key
/// kept verbatim in `extra`. Top-level key order survives a round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfigDocument {
    servers_key: String,
    servers: Map<String, Value>,
    extra: Map<String, Value>,
}

impl AgentConfigDocument {
    pub fn empty(servers_key: impl Into<String>) -> Self {
        Self {
            servers_key: servers_key.into(),
            servers: Map::new(),
            extra: Map::new(),
        }
    }

    /// Split a parsed root object. A missing servers key becomes an empty
    /// mapping; a non-object servers value is rejected.
    ///
    /// An existing servers key keeps its slot in `extra` as a `null`
    /// placeholder so [`Self::into_map`] writes it back in place.
    pub fn from_map(
        servers_key: impl Into<String>,
        mut root: Map<String, Value>,
        origin: &Path,
    ) -> Result<Self, AgentError> {
        let servers_key = servers_key.into();
        let servers = match root.get_mut(&servers_key).map(Value::take) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(AgentError::InvalidDocument(origin.to_path_buf())),
        };
        Ok(Self {
            servers_key,
            servers,
            extra: root,
        })
    }

    pub fn servers_key(&self) -> &str {
        &self.servers_key
    }

    pub fn servers(&self) -> &Map<String, Value> {
        &self.servers
    }

    /// Top-level value other than the servers mapping.
    pub fn top_level(&self, key: &str) -> Option<&Value> {
        if key == self.servers_key {
            return None;
        }
        self.extra.get(key)
    }

    pub fn server(&self, name: &str) -> Option<&Value> {
        self.servers.get(name)
    }

    pub fn set_server(&mut self, name: impl Into<String>, entry: Value) {
        self.servers.insert(name.into(), entry);
    }

    /// Returns the removed entry, if any.
    pub fn remove_server(&mut self, name: &str) -> Option<Value> {
        self.servers.remove(name)
    }

    pub fn into_map(self) -> Map<String, Value> {
        let mut root = self.extra;
        root.insert(self.servers_key, Value::Object(self.servers));
        root
    }
}

/// Read a JSON object file; `None` when the file does not exist.
pub(crate) fn read_json_map(path: &Path) -> Result<Option<Map<String, Value>>, AgentError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AgentError::ConfigIo {
                context: "failed to read config file",
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let value: Value = serde_json::from_slice(&bytes).map_err(|source| AgentError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(AgentError::InvalidDocument(path.to_path_buf())),
    }
}

/// Write `map` as 2-space pretty JSON, creating parent directories.
pub(crate) fn write_json_map(path: &Path, map: &Map<String, Value>) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AgentError::ConfigIo {
            context: "failed to create config directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut bytes = serde_json::to_vec_pretty(map).map_err(|source| AgentError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    std::fs::write(path, bytes).map_err(|source| AgentError::ConfigIo {
        context: "failed to write config file",
        path: path.to_path_buf(),
        source,
    })
}
