//! Versioned catalog of agent specifications.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::adapter::{AgentConfigAdapter, RegistryAgentConfig};
use super::spec::{AgentSpec, ConfigDirectorySpec};
use crate::context::AppContext;
use crate::error::AgentError;

pub const AGENTS_FILE: &str = "agents.json";

const BUNDLED: &str = include_str!("../../assets/agents.json");

/// Registry document, persisted as `agents.json` in the config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistry {
    pub version: String,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_directory: Option<ConfigDirectorySpec>,
    #[serde(skip)]
    path: PathBuf,
}

impl AgentRegistry {
    /// Registry shipped with the binary.
    pub fn bundled() -> Result<Self, AgentError> {
        Self::from_json(BUNDLED, "bundled agents.json")
    }

    pub fn from_json(content: &str, origin: &str) -> Result<Self, AgentError> {
        serde_json::from_str(content).map_err(|source| AgentError::RegistryParse {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn registry_path(ctx: &AppContext) -> PathBuf {
        ctx.config_dir().join(AGENTS_FILE)
    }

    /// Load the persisted registry, or fall back to the bundled one.
    ///
    /// Custom agents from the project descriptor replace bundled entries with
    /// the same type. They are only merged on the fallback path; a persisted
    /// registry already carries whatever was registered.
    pub fn load(ctx: &AppContext, custom: &BTreeMap<String, AgentSpec>) -> Result<Self, AgentError> {
        let path = Self::registry_path(ctx);
        match Self::read(&path) {
            Ok(Some(registry)) => {
                debug!(path = %path.display(), version = %registry.version, "loaded agent registry");
                return Ok(registry.with_path(path));
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "ignoring persisted agent registry"),
        }

        let mut registry = Self::bundled()?.with_path(path);
        registry.merge_custom(custom);
        registry.install()?;
        Ok(registry)
    }

    /// Point the registry at a different persistence file.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<Option<Self>, AgentError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AgentError::RegistryIo {
                    context: "failed to read agent registry",
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_json(&content, &path.display().to_string()).map(Some)
    }

    pub fn merge_custom(&mut self, custom: &BTreeMap<String, AgentSpec>) {
        for (agent_type, spec) in custom {
            debug!(agent = %agent_type, "merging custom agent");
            self.agents.insert(agent_type.clone(), spec.clone());
        }
    }

    /// Persist unless the stored copy already has this version.
    ///
    /// Versions are compared as plain strings. Returns whether the file was
    /// written.
    pub fn install(&self) -> Result<bool, AgentError> {
        let stale = match Self::read(&self.path) {
            Ok(Some(existing)) => existing.version != self.version,
            Ok(None) | Err(_) => true,
        };
        if !stale {
            debug!(version = %self.version, "agent registry is current");
            return Ok(false);
        }
        self.save()?;
        info!(path = %self.path.display(), version = %self.version, "installed agent registry");
        Ok(true)
    }

    pub fn save(&self) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AgentError::RegistryIo {
                context: "failed to create config directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|source| AgentError::RegistryParse {
                origin: self.path.display().to_string(),
                source,
            })?;
        std::fs::write(&self.path, content).map_err(|source| AgentError::RegistryIo {
            context: "failed to write agent registry",
            path: self.path.clone(),
            source,
        })
    }

    pub fn get(&self, agent_type: &str) -> Option<&AgentSpec> {
        self.agents.get(agent_type)
    }

    pub fn spec(&self, agent_type: &str) -> Result<&AgentSpec, AgentError> {
        self.get(agent_type)
            .ok_or_else(|| AgentError::Lookup(agent_type.to_string()))
    }

    /// All known types, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// Types whose detection rules match this machine, sorted.
    pub fn detect(&self, ctx: &AppContext) -> Vec<String> {
        self.agents
            .iter()
            .filter(|(_, spec)| spec.is_available(ctx))
            .map(|(agent_type, _)| agent_type.clone())
            .collect()
    }

    pub fn resolve_path(
        &self,
        agent_type: &str,
        prefer_local: bool,
        ctx: &AppContext,
    ) -> Result<PathBuf, AgentError> {
        self.spec(agent_type)?
            .config_path(prefer_local, ctx)
            .ok_or_else(|| AgentError::NoConfigPath(agent_type.to_string()))
    }

    /// Add or replace an agent and persist the whole document.
    pub fn add_custom(&mut self, agent_type: &str, mut spec: AgentSpec) -> Result<(), AgentError> {
        if spec.agent_type.is_empty() {
            spec.agent_type = agent_type.to_string();
        }
        self.agents.insert(agent_type.to_string(), spec);
        self.save()?;
        info!(agent = agent_type, "registered agent");
        Ok(())
    }

    pub fn remove_custom(&mut self, agent_type: &str) -> Result<AgentSpec, AgentError> {
        let spec = self
            .agents
            .remove(agent_type)
            .ok_or_else(|| AgentError::Lookup(agent_type.to_string()))?;
        self.save()?;
        info!(agent = agent_type, "unregistered agent");
        Ok(spec)
    }

    /// Config adapter for `agent_type`, bound to its resolved path.
    pub fn adapter(
        &self,
        agent_type: &str,
        ctx: &AppContext,
        prefer_local: bool,
    ) -> Result<Box<dyn AgentConfigAdapter>, AgentError> {
        let spec = self.spec(agent_type)?;
        let path = self.resolve_path(agent_type, prefer_local, ctx)?;
        Ok(Box::new(RegistryAgentConfig::new(agent_type, spec, path)))
    }
}
