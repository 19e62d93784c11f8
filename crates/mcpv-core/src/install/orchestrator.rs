//! Fetch → build → resolve sequencing with rollback and idempotency.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{ServerInstallation, install_path};
use crate::build::Builder;
use crate::ecosystem::Ecosystem;
use crate::error::{InstallError, ResolutionError};
use crate::git::{GitFetcher, LATEST, RepositoryFetcher};
use crate::runtime::{self, RunnerSpec};

/// Progress of a single install. Failure is terminal at whichever state was
/// last reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Requested,
    Reserved,
    Fetched,
    DependenciesInstalled,
    Built,
    ExecutionResolved,
    Registered,
}

/// Result of an idempotent install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(ServerInstallation),
    AlreadyInstalled(ServerInstallation),
}

impl InstallOutcome {
    pub fn installation(&self) -> &ServerInstallation {
        match self {
            Self::Installed(server) | Self::AlreadyInstalled(server) => server,
        }
    }

    pub fn into_installation(self) -> ServerInstallation {
        match self {
            Self::Installed(server) | Self::AlreadyInstalled(server) => server,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

struct Progress<'a> {
    name: &'a str,
    version: &'a str,
    state: InstallState,
}

impl<'a> Progress<'a> {
    fn new(name: &'a str, version: &'a str) -> Self {
        Self {
            name,
            version,
            state: InstallState::Requested,
        }
    }

    fn advance(&mut self, next: InstallState) {
        debug!(
            server = self.name,
            version = self.version,
            from = ?self.state,
            to = ?next,
            "install transition"
        );
        self.state = next;
    }
}

/// Owns the install root and the collaborators used to populate it.
pub struct InstallOrchestrator {
    install_root: PathBuf,
    fetcher: Box<dyn RepositoryFetcher>,
    builder: Builder,
}

impl fmt::Debug for InstallOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallOrchestrator")
            .field("install_root", &self.install_root)
            .finish_non_exhaustive()
    }
}

impl InstallOrchestrator {
    pub fn new(install_root: PathBuf, fetcher: Box<dyn RepositoryFetcher>, builder: Builder) -> Self {
        Self {
            install_root,
            fetcher,
            builder,
        }
    }

    /// Orchestrator using libgit2 and real build processes.
    pub fn with_defaults(install_root: PathBuf) -> Self {
        Self::new(install_root, Box::new(GitFetcher::new()), Builder::default())
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn fetcher(&self) -> &dyn RepositoryFetcher {
        self.fetcher.as_ref()
    }

    pub fn install_path(&self, name: &str, version: &str) -> PathBuf {
        install_path(&self.install_root, name, version)
    }

    pub fn is_installed(&self, name: &str, version: &str) -> bool {
        self.install_path(name, version).exists()
    }

    /// Install `name@version` from `repository`.
    ///
    /// Fails with [`InstallError::AlreadyInstalled`] before touching the
    /// filesystem if the install path exists. A fetch failure removes the
    /// reserved directory; later failures leave it in place for diagnosis.
    pub fn install(
        &self,
        name: &str,
        version: &str,
        repository: &str,
    ) -> Result<ServerInstallation, InstallError> {
        let mut progress = Progress::new(name, version);
        let path = self.install_path(name, version);

        if path.exists() {
            return Err(InstallError::AlreadyInstalled {
                name: name.to_string(),
                version: version.to_string(),
                path,
            });
        }

        std::fs::create_dir_all(&path).map_err(|err| {
            InstallError::io(
                format!("failed to create server directory {}", path.display()),
                err,
            )
        })?;
        progress.advance(InstallState::Reserved);

        if let Err(err) = self.fetcher.fetch(repository, version, &path) {
            if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove reserved directory");
            }
            self.prune_server_dir(name);
            return Err(err.into());
        }
        progress.advance(InstallState::Fetched);

        let ecosystem = Ecosystem::detect(&path);
        debug!(server = name, %ecosystem, "detected ecosystem");

        self.builder.install_dependencies(&path, ecosystem)?;
        progress.advance(InstallState::DependenciesInstalled);

        self.builder.compile(&path, ecosystem)?;
        progress.advance(InstallState::Built);

        let runner = runtime::resolve(&path, ecosystem)?;
        progress.advance(InstallState::ExecutionResolved);

        let mut server = ServerInstallation::declared(name, version, repository);
        server.install_path = Some(path);
        server.installed = true;
        server.apply_runner(runner);
        progress.advance(InstallState::Registered);

        info!(server = name, version, command = %server.command, "installed server");
        Ok(server)
    }

    /// Install a declared server, treating an existing install as success.
    ///
    /// Fresh and existing installs end up with the same execution fields: a
    /// declared command wins together with its args, otherwise the launch
    /// spec is resolved from the tree, and declared env is layered on top.
    /// If an existing tree cannot be resolved the returned server has no
    /// command.
    pub fn install_or_reuse(
        &self,
        declared: &ServerInstallation,
    ) -> Result<InstallOutcome, InstallError> {
        if declared.repository.is_empty() {
            return Err(InstallError::MissingRepository {
                name: declared.name.clone(),
            });
        }
        let version = if declared.version.is_empty() {
            LATEST
        } else {
            declared.version.as_str()
        };

        match self.install(&declared.name, version, &declared.repository) {
            Ok(mut server) => {
                apply_declared_execution(&mut server, declared);
                Ok(InstallOutcome::Installed(server))
            }
            Err(InstallError::AlreadyInstalled { path, .. }) => {
                info!(server = %declared.name, version, "already installed");
                let mut server =
                    ServerInstallation::declared(&declared.name, version, &declared.repository);
                server.installed = true;
                if !declared.has_execution() {
                    match self.resolve_execution_at(&path) {
                        Ok(runner) => server.apply_runner(runner),
                        Err(err) => {
                            warn!(server = %declared.name, error = %err, "could not re-derive execution");
                        }
                    }
                }
                apply_declared_execution(&mut server, declared);
                server.install_path = Some(path);
                Ok(InstallOutcome::AlreadyInstalled(server))
            }
            Err(err) => Err(err),
        }
    }

    /// Launch spec for an installed tree.
    pub fn resolve_execution(&self, name: &str, version: &str) -> Result<RunnerSpec, ResolutionError> {
        self.resolve_execution_at(&self.install_path(name, version))
    }

    fn resolve_execution_at(&self, path: &Path) -> Result<RunnerSpec, ResolutionError> {
        runtime::resolve(path, Ecosystem::detect(path))
    }

    /// Remove `name@version`, then the server directory once no versions remain.
    pub fn remove(&self, name: &str, version: &str) -> Result<(), InstallError> {
        let path = self.install_path(name, version);
        if !path.exists() {
            return Err(InstallError::NotInstalled {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        std::fs::remove_dir_all(&path).map_err(|err| {
            InstallError::io(format!("failed to remove server {}", path.display()), err)
        })?;

        self.prune_server_dir(name);
        info!(server = name, version, "removed server");
        Ok(())
    }

    /// Drop `<root>/<name>` once it holds no versions.
    fn prune_server_dir(&self, name: &str) {
        let parent = self.install_root.join(name);
        if is_empty_dir(&parent) {
            if let Err(err) = std::fs::remove_dir(&parent) {
                debug!(path = %parent.display(), error = %err, "failed to remove empty server directory");
            }
        }
    }

    /// All `name@version` trees under the install root, sorted.
    pub fn list_installed(&self) -> Result<Vec<ServerInstallation>, InstallError> {
        let mut servers = Vec::new();
        for name in sorted_subdirs(&self.install_root)? {
            for version in sorted_subdirs(&self.install_root.join(&name))? {
                let mut server = ServerInstallation::declared(name.clone(), version.clone(), "");
                server.install_path = Some(self.install_path(&name, &version));
                server.installed = true;
                servers.push(server);
            }
        }
        Ok(servers)
    }

    pub fn versions_of(&self, name: &str) -> Result<Vec<String>, InstallError> {
        sorted_subdirs(&self.install_root.join(name))
    }
}

fn apply_declared_execution(server: &mut ServerInstallation, declared: &ServerInstallation) {
    if declared.has_execution() {
        server.command = declared.command.clone();
        server.args = declared.args.clone();
    }
    server
        .env
        .extend(declared.env.iter().map(|(k, v)| (k.clone(), v.clone())));
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<String>, InstallError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(InstallError::io(
                format!("failed to read {}", dir.display()),
                err,
            ));
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
