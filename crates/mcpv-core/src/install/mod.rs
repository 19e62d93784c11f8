//! Server installation model and the install orchestrator.

mod orchestrator;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::runtime::RunnerSpec;

pub use orchestrator::{InstallOrchestrator, InstallOutcome, InstallState};

/// One concrete `name@version` artifact and how to launch it.
///
/// The same shape is used for declared servers in the project descriptor,
/// where the execution fields may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstallation {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub installed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServerInstallation {
    /// Declared server with no execution metadata.
    pub fn declared(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Replace command, args and env with a resolved launch spec.
    pub fn apply_runner(&mut self, runner: RunnerSpec) {
        self.command = runner.command;
        self.args = runner.args;
        self.env = runner.env;
    }

    pub fn has_execution(&self) -> bool {
        !self.command.is_empty()
    }
}

/// `<root>/<name>/<version>`.
pub fn install_path(root: &Path, name: &str, version: &str) -> PathBuf {
    root.join(name).join(version)
}
