//! Generic agent config adapter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::spec::AgentSpec;
use crate::config::AgentConfigDocument;
use crate::config::document::{read_json_map, write_json_map};
use crate::error::AgentError;
use crate::install::ServerInstallation;

/// Locate, load, save and patch one agent's config file.
pub trait AgentConfigAdapter: Send + Sync {
    fn agent_type(&self) -> &str;

    fn config_path(&self) -> &Path;

    /// Parsed document; a missing file yields the agent's empty structure.
    fn load(&self) -> Result<AgentConfigDocument, AgentError>;

    /// Overwrite the whole file, creating parent directories.
    fn save(&self, document: &AgentConfigDocument) -> Result<(), AgentError>;

    /// Server entry in this agent's field naming, empty fields omitted.
    fn entry_for(&self, installation: &ServerInstallation) -> Value;

    /// Set the entry for `installation.name`, replacing any previous one.
    fn add_entry(&self, installation: &ServerInstallation) -> Result<(), AgentError> {
        let mut document = self.load()?;
        document.set_server(installation.name.clone(), self.entry_for(installation));
        self.save(&document)
    }

    /// Returns false, without writing, when no entry existed.
    fn remove_entry(&self, name: &str) -> Result<bool, AgentError> {
        let mut document = self.load()?;
        if document.remove_server(name).is_none() {
            debug!(agent = self.agent_type(), server = name, "no entry to remove");
            return Ok(false);
        }
        self.save(&document)?;
        Ok(true)
    }
}

/// [`AgentConfigAdapter`] driven entirely by an [`AgentSpec`].
#[derive(Debug, Clone)]
pub struct RegistryAgentConfig {
    agent_type: String,
    path: PathBuf,
    servers_key: String,
    structure: Option<Map<String, Value>>,
    field_names: BTreeMap<String, String>,
}

impl RegistryAgentConfig {
    pub fn new(agent_type: impl Into<String>, spec: &AgentSpec, path: PathBuf) -> Self {
        Self {
            agent_type: agent_type.into(),
            path,
            servers_key: spec.config.servers_key().to_string(),
            structure: spec.config.structure.clone(),
            field_names: spec.server_config_format.clone(),
        }
    }

    fn field(&self, name: &str) -> String {
        self.field_names
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl AgentConfigAdapter for RegistryAgentConfig {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn config_path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AgentConfigDocument, AgentError> {
        let root = match read_json_map(&self.path)? {
            Some(root) => root,
            None => self.structure.clone().unwrap_or_default(),
        };
        AgentConfigDocument::from_map(self.servers_key.clone(), root, &self.path)
    }

    fn save(&self, document: &AgentConfigDocument) -> Result<(), AgentError> {
        write_json_map(&self.path, &document.clone().into_map())?;
        debug!(agent = %self.agent_type, path = %self.path.display(), "saved agent config");
        Ok(())
    }

    fn entry_for(&self, installation: &ServerInstallation) -> Value {
        let mut entry = Map::new();
        if !installation.command.is_empty() {
            entry.insert(
                self.field("command"),
                Value::String(installation.command.clone()),
            );
        }
        if !installation.args.is_empty() {
            entry.insert(
                self.field("args"),
                Value::Array(
                    installation
                        .args
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
            );
        }
        if !installation.env.is_empty() {
            entry.insert(
                self.field("env"),
                Value::Object(
                    installation
                        .env
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                ),
            );
        }
        Value::Object(entry)
    }
}
