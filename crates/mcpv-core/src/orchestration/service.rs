//! Service layer used by frontends.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::agent::{AgentOp, AgentRegistry, AgentSpec, apply_to_agent, apply_to_all_detected};
use crate::config::ProjectDescriptor;
use crate::context::AppContext;
use crate::error::{AgentError, DescriptorError, Error, InstallError, Result};
use crate::git::LATEST;
use crate::install::{InstallOrchestrator, ServerInstallation};

/// Which agent configs an install is registered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTarget {
    /// Every detected agent, at its global config path. Failures are warnings.
    Detected,
    /// One named agent. Its failure fails the operation.
    Agent {
        agent_type: String,
        prefer_local: bool,
    },
}

impl AgentTarget {
    /// An explicit agent wins over the descriptor default; neither means all
    /// detected agents.
    pub fn select(explicit: Option<&str>, default_agent: Option<&str>, prefer_local: bool) -> Self {
        match explicit.or(default_agent) {
            Some(agent_type) => AgentTarget::Agent {
                agent_type: agent_type.to_string(),
                prefer_local,
            },
            None => AgentTarget::Detected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledServer {
    pub installation: ServerInstallation,
    /// False when the version was already on disk.
    pub fresh: bool,
    /// Agent types whose config now has the entry.
    pub agents: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub servers: Vec<InstalledServer>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct UpdateReport {
    pub updated: Vec<ServerInstallation>,
    pub up_to_date: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<(String, Error)>,
}

#[derive(Debug)]
pub struct AgentOverview {
    pub agent_type: String,
    pub name: String,
    pub config_path: std::result::Result<PathBuf, AgentError>,
}

/// Owns the context, install orchestrator and agent registry for one project.
#[derive(Debug)]
pub struct McpvService {
    pub(super) ctx: AppContext,
    pub(super) installer: InstallOrchestrator,
    pub(super) registry: AgentRegistry,
    pub(super) descriptor_path: PathBuf,
}

impl McpvService {
    pub fn new(ctx: AppContext, installer: InstallOrchestrator, registry: AgentRegistry) -> Self {
        let descriptor_path = ctx.descriptor_path();
        Self {
            ctx,
            installer,
            registry,
            descriptor_path,
        }
    }

    /// Service with real git and build collaborators.
    ///
    /// Custom agents declared in the project descriptor are merged into the
    /// registry; a broken descriptor only costs those agents.
    pub fn from_context(ctx: AppContext, descriptor_path: Option<PathBuf>) -> Result<Self> {
        let descriptor_path = descriptor_path.unwrap_or_else(|| ctx.descriptor_path());
        let custom = match ProjectDescriptor::load_if_exists(&descriptor_path) {
            Ok(descriptor) => descriptor.agents,
            Err(err) => {
                warn!(error = %err, "failed to load custom agents");
                BTreeMap::new()
            }
        };
        let registry = AgentRegistry::load(&ctx, &custom)?;
        let installer = InstallOrchestrator::with_defaults(ctx.install_root().to_path_buf());
        Ok(Self::new(ctx, installer, registry).with_descriptor_path(descriptor_path))
    }

    pub fn with_descriptor_path(mut self, path: PathBuf) -> Self {
        self.descriptor_path = path;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn installer(&self) -> &InstallOrchestrator {
        &self.installer
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Create the project descriptor with a default agent.
    pub fn init_project(&self, default_agent: &str, force: bool) -> Result<PathBuf> {
        self.registry.spec(default_agent)?;
        if self.descriptor_path.exists() && !force {
            return Err(DescriptorError::AlreadyExists(self.descriptor_path.clone()).into());
        }
        ProjectDescriptor::new(Some(default_agent.to_string())).save(&self.descriptor_path)?;
        info!(path = %self.descriptor_path.display(), agent = default_agent, "initialized project");
        Ok(self.descriptor_path.clone())
    }

    /// Install every declared server and register it with agents.
    ///
    /// Versions already on disk count as success. With no explicit agent the
    /// descriptor's default agent is used, else all detected agents.
    pub fn install_from_descriptor(
        &self,
        agent: Option<&str>,
        prefer_local: bool,
    ) -> Result<InstallReport> {
        let descriptor = ProjectDescriptor::load(&self.descriptor_path)?;
        let target = self.target(agent, descriptor.default_agent.as_deref(), prefer_local)?;
        let mut report = InstallReport::default();

        for declared in &descriptor.servers {
            let outcome = self.installer.install_or_reuse(declared)?;
            let fresh = outcome.is_fresh();
            let installation = outcome.into_installation();
            if !installation.has_execution() {
                warn!(server = %installation.name, "no launch command, skipping agent registration");
                report.warnings.push(format!(
                    "could not determine how to run {}@{}, not registering it with agents",
                    installation.name, installation.version
                ));
                report.servers.push(InstalledServer {
                    installation,
                    fresh,
                    agents: Vec::new(),
                });
                continue;
            }
            let agents = match self.register(&installation, &target) {
                Ok(agents) => agents,
                Err(err) if target == AgentTarget::Detected => {
                    warn!(server = %installation.name, error = %err, "agent registration failed");
                    report.warnings.push(format!(
                        "failed to configure {} for agents: {err}",
                        installation.name
                    ));
                    Vec::new()
                }
                Err(err) => return Err(err.into()),
            };
            report.servers.push(InstalledServer {
                installation,
                fresh,
                agents,
            });
        }

        Ok(report)
    }

    /// Install one server, record it in the descriptor, then register it.
    pub fn install_server(
        &self,
        name: &str,
        version: &str,
        repository: &str,
        agent: Option<&str>,
        prefer_local: bool,
    ) -> Result<InstalledServer> {
        if repository.is_empty() {
            return Err(InstallError::MissingRepository {
                name: name.to_string(),
            }
            .into());
        }
        let version = if version.is_empty() { LATEST } else { version };

        let mut descriptor = ProjectDescriptor::load_if_exists(&self.descriptor_path)?;
        let target = self.target(agent, descriptor.default_agent.as_deref(), prefer_local)?;

        let installation = self.installer.install(name, version, repository)?;
        descriptor.upsert_server(installation.clone());
        descriptor.save(&self.descriptor_path)?;

        let agents = self.register(&installation, &target)?;
        Ok(InstalledServer {
            installation,
            fresh: true,
            agents,
        })
    }

    /// Install the newest tagged version of every declared server.
    pub fn update_from_descriptor(&self) -> Result<UpdateReport> {
        let descriptor = ProjectDescriptor::load(&self.descriptor_path)?;
        let mut report = UpdateReport::default();

        for server in &descriptor.servers {
            if server.repository.is_empty() {
                report.skipped.push(server.name.clone());
                continue;
            }
            let latest = match self.installer.fetcher().latest_version(&server.repository) {
                Ok(latest) => latest,
                Err(err) => {
                    warn!(server = %server.name, error = %err, "failed to resolve latest version");
                    report
                        .failures
                        .push((server.name.clone(), InstallError::from(err).into()));
                    continue;
                }
            };
            if self.installer.is_installed(&server.name, &latest) {
                report.up_to_date.push(format!("{}@{latest}", server.name));
                continue;
            }
            match self.installer.install(&server.name, &latest, &server.repository) {
                Ok(installation) => report.updated.push(installation),
                Err(err) => {
                    warn!(server = %server.name, error = %err, "update failed");
                    report.failures.push((server.name.clone(), err.into()));
                }
            }
        }

        Ok(report)
    }

    pub fn list_installed(&self) -> Result<Vec<ServerInstallation>> {
        Ok(self.installer.list_installed()?)
    }

    pub fn list_project(&self) -> Result<ProjectDescriptor> {
        Ok(ProjectDescriptor::load(&self.descriptor_path)?)
    }

    /// Detected agents with the config path each would be written to.
    pub fn agents_overview(&self) -> Vec<AgentOverview> {
        self.registry
            .detect(&self.ctx)
            .into_iter()
            .map(|agent_type| {
                let name = self
                    .registry
                    .get(&agent_type)
                    .map(|spec| spec.name.clone())
                    .unwrap_or_default();
                let config_path = self.registry.resolve_path(&agent_type, false, &self.ctx);
                AgentOverview {
                    agent_type,
                    name,
                    config_path,
                }
            })
            .collect()
    }

    /// Register the highest installed version of `name` with one agent.
    pub fn add_server_to_agent(
        &self,
        name: &str,
        agent_type: &str,
        prefer_local: bool,
    ) -> Result<PathBuf> {
        self.registry.spec(agent_type)?;
        let version = highest_version(self.installer.versions_of(name)?)
            .ok_or_else(|| InstallError::NotInstalled {
                name: name.to_string(),
                version: String::new(),
            })?;

        let declared = ProjectDescriptor::load_if_exists(&self.descriptor_path)?
            .find(name, &version)
            .cloned();
        let mut installation =
            declared.unwrap_or_else(|| ServerInstallation::declared(name, version.clone(), ""));
        installation.install_path = Some(self.installer.install_path(name, &version));
        installation.installed = true;
        installation.apply_runner(
            self.installer
                .resolve_execution(name, &version)
                .map_err(InstallError::from)?,
        );

        Ok(apply_to_agent(
            &self.registry,
            &self.ctx,
            agent_type,
            prefer_local,
            AgentOp::Add(&installation),
        )?)
    }

    /// Remove `name` from every detected agent config.
    pub fn remove_server_from_agents(&self, name: &str) -> Result<Vec<String>> {
        Ok(apply_to_all_detected(
            &self.registry,
            &self.ctx,
            false,
            AgentOp::Remove(name),
        )?)
    }

    pub fn register_custom_agent(&mut self, agent_type: &str, spec: AgentSpec) -> Result<()> {
        Ok(self.registry.add_custom(agent_type, spec)?)
    }

    pub fn unregister_custom_agent(&mut self, agent_type: &str) -> Result<AgentSpec> {
        Ok(self.registry.remove_custom(agent_type)?)
    }

    fn target(
        &self,
        explicit: Option<&str>,
        default_agent: Option<&str>,
        prefer_local: bool,
    ) -> Result<AgentTarget> {
        let target = AgentTarget::select(explicit, default_agent, prefer_local);
        if let AgentTarget::Agent { agent_type, .. } = &target {
            self.registry.spec(agent_type)?;
        }
        Ok(target)
    }

    fn register(
        &self,
        installation: &ServerInstallation,
        target: &AgentTarget,
    ) -> std::result::Result<Vec<String>, AgentError> {
        let op = AgentOp::Add(installation);
        match target {
            AgentTarget::Detected => apply_to_all_detected(&self.registry, &self.ctx, false, op),
            AgentTarget::Agent {
                agent_type,
                prefer_local,
            } => {
                apply_to_agent(&self.registry, &self.ctx, agent_type, *prefer_local, op)?;
                Ok(vec![agent_type.clone()])
            }
        }
    }
}

/// Split `name@version`; the version is empty when absent.
pub fn parse_server_spec(spec: &str) -> (&str, &str) {
    spec.split_once('@').unwrap_or((spec, ""))
}

/// Accept empty, `latest`, or a semantic version with an optional `v`.
pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version == LATEST {
        return Ok(());
    }
    semver::Version::parse(version.strip_prefix('v').unwrap_or(version))
        .map(|_| ())
        .map_err(|source| Error::InvalidVersion {
            version: version.to_string(),
            source,
        })
}

fn parse_semver(version: &str) -> Option<semver::Version> {
    semver::Version::parse(version.strip_prefix('v').unwrap_or(version)).ok()
}

/// Semver versions order above anything else; the rest compare as text.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

fn highest_version(versions: Vec<String>) -> Option<String> {
    versions.into_iter().max_by(|a, b| compare_versions(a, b))
}
