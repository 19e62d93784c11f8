//! Server removal across install root, agent configs and descriptor.

use tracing::{info, warn};

use super::service::McpvService;
use crate::agent::{AgentOp, apply_to_all_detected};
use crate::config::ProjectDescriptor;
use crate::error::{DescriptorError, Result};

#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Versions whose install directory was deleted.
    pub removed_versions: Vec<String>,
    /// Agent configs the entry was removed from.
    pub agents: Vec<String>,
    /// Entries dropped from the project descriptor.
    pub descriptor_entries: usize,
    pub warnings: Vec<String>,
}

impl RemovalReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

impl McpvService {
    /// Remove one version, or every installed version when `version` is `None`.
    ///
    /// Install directory and agent config failures are reported as warnings;
    /// the descriptor is updated regardless.
    pub fn remove_server(&self, name: &str, version: Option<&str>) -> Result<RemovalReport> {
        let mut report = RemovalReport::default();

        let versions = match version {
            Some(version) => vec![version.to_string()],
            None => {
                let versions = self.installer.versions_of(name)?;
                if versions.is_empty() {
                    report.warn(format!(
                        "server {name} is not installed, removing it from the descriptor only"
                    ));
                }
                versions
            }
        };

        for version in &versions {
            match self.installer.remove(name, version) {
                Ok(()) => report.removed_versions.push(version.clone()),
                Err(err) => report.warn(format!("failed to remove {name}@{version}: {err}")),
            }
        }

        match apply_to_all_detected(&self.registry, &self.ctx, false, AgentOp::Remove(name)) {
            Ok(agents) => report.agents = agents,
            Err(err) => report.warn(format!(
                "failed to remove {name} from agent configurations: {err}"
            )),
        }

        match self.remove_from_descriptor(name, version) {
            Ok(count) => report.descriptor_entries = count,
            Err(err) => report.warn(err.to_string()),
        }

        info!(
            server = name,
            versions = report.removed_versions.len(),
            "removed server"
        );
        Ok(report)
    }

    fn remove_from_descriptor(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> std::result::Result<usize, DescriptorError> {
        if !self.descriptor_path.exists() {
            return Ok(0);
        }
        let mut descriptor = ProjectDescriptor::load(&self.descriptor_path)?;
        let removed = match version {
            Some(version) => {
                if !descriptor.remove_server(name, version) {
                    return Err(DescriptorError::ServerNotFound {
                        name: name.to_string(),
                        version: version.to_string(),
                    });
                }
                1
            }
            None => descriptor.remove_all_versions(name),
        };
        if removed > 0 {
            descriptor.save(&self.descriptor_path)?;
        }
        Ok(removed)
    }
}
