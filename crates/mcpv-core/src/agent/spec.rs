//! Agent specifications as stored in the registry document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::paths::expand_path;
use crate::config::DEFAULT_SERVERS_KEY;
use crate::context::AppContext;

fn default_format() -> String {
    "json".to_string()
}

/// Declarative description of one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub agent_type: String,
    #[serde(default)]
    pub description: String,
    /// Config lives in one user-wide location; local preference is ignored.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub global: bool,
    #[serde(default)]
    pub config: ConfigSpec,
    /// Logical entry field (`command`, `args`, `env`) to the key the agent expects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub server_config_format: BTreeMap<String, String>,
    #[serde(default)]
    pub detection: DetectionSpec,
}

/// Where an agent keeps its config file and what an empty one looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    /// Project-relative path used when a local config is preferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers_key: Option<String>,
}

impl Default for ConfigSpec {
    fn default() -> Self {
        Self {
            path: None,
            paths: Vec::new(),
            local_path: None,
            format: default_format(),
            structure: None,
            servers_key: None,
        }
    }
}

impl ConfigSpec {
    pub fn servers_key(&self) -> &str {
        self.servers_key.as_deref().unwrap_or(DEFAULT_SERVERS_KEY)
    }
}

/// An agent is available when any path exists or any command is on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSpec {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl DetectionSpec {
    pub fn is_available(&self, ctx: &AppContext) -> bool {
        self.paths
            .iter()
            .any(|path| expand_path(path, ctx).exists())
            || self
                .commands
                .iter()
                .any(|command| which::which(command).is_ok())
    }
}

/// Where the registry document itself is kept, per operating system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDirectorySpec {
    pub name: String,
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    pub agents_file: String,
}

impl AgentSpec {
    pub fn is_available(&self, ctx: &AppContext) -> bool {
        self.detection.is_available(ctx)
    }

    /// Config file location for this agent, or `None` if the spec has no
    /// path rule.
    ///
    /// Global agents never use `local_path`. A candidate list yields the first
    /// entry whose parent directory exists, falling back to the first entry.
    pub fn config_path(&self, prefer_local: bool, ctx: &AppContext) -> Option<PathBuf> {
        let prefer_local = prefer_local && !self.global;
        let config = &self.config;

        if prefer_local {
            if let Some(local) = &config.local_path {
                return Some(expand_path(local, ctx));
            }
        }

        if let Some(path) = &config.path {
            return Some(expand_path(path, ctx));
        }

        let candidates: Vec<PathBuf> = config
            .paths
            .iter()
            .map(|path| expand_path(path, ctx))
            .collect();
        candidates
            .iter()
            .find(|path| path.parent().is_some_and(Path::exists))
            .or_else(|| candidates.first())
            .cloned()
    }

    /// Emitted key for a logical entry field.
    pub fn field_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.server_config_format
            .get(field)
            .map(String::as_str)
            .unwrap_or(field)
    }
}
