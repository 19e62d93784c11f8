//! Project descriptor (`mcpv.json`) persistence.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::AgentSpec;
use crate::error::DescriptorError;
use crate::install::ServerInstallation;

pub const DESCRIPTOR_FILE: &str = "mcpv.json";

/// Servers declared for a project plus optional agent settings.
///
/// Always read and written as a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub servers: Vec<ServerInstallation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    /// Inline custom agents merged over the bundled registry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, AgentSpec>,
}

impl ProjectDescriptor {
    pub fn new(default_agent: Option<String>) -> Self {
        Self {
            default_agent,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields an empty descriptor.
    pub fn load_if_exists(path: &Path) -> Result<Self, DescriptorError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), DescriptorError> {
        let content = serde_json::to_string_pretty(self).map_err(DescriptorError::Serialize)?;
        std::fs::write(path, content).map_err(|source| DescriptorError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn find(&self, name: &str, version: &str) -> Option<&ServerInstallation> {
        self.servers
            .iter()
            .find(|s| s.name == name && s.version == version)
    }

    /// Replace the entry with the same name and version, or append.
    pub fn upsert_server(&mut self, server: ServerInstallation) {
        match self
            .servers
            .iter_mut()
            .find(|s| s.name == server.name && s.version == server.version)
        {
            Some(existing) => *existing = server,
            None => self.servers.push(server),
        }
    }

    /// Returns false when no entry matched.
    pub fn remove_server(&mut self, name: &str, version: &str) -> bool {
        let before = self.servers.len();
        self.servers
            .retain(|s| !(s.name == name && s.version == version));
        self.servers.len() != before
    }

    /// Drop every version of `name`, returning how many entries were removed.
    pub fn remove_all_versions(&mut self, name: &str) -> usize {
        let before = self.servers.len();
        self.servers.retain(|s| s.name != name);
        before - self.servers.len()
    }
}
