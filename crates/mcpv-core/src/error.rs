//! Error types for install orchestration and agent configuration.
//!
//! Failures are grouped by the subsystem that produced them so callers can
//! decide which ones are fatal: install errors abort an install, while agent
//! errors raised during a fan-out are usually downgraded to warnings.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by the service layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the fetch → build → resolve sequence.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("server {name}@{version} is already installed at {}", path.display())]
    AlreadyInstalled {
        name: String,
        version: String,
        path: PathBuf,
    },
    /// An empty version means no version of `name` is installed.
    #[error("server {name}{} is not installed", at_version(.version))]
    NotInstalled { name: String, version: String },
    #[error("repository not specified for server {name}")]
    MissingRepository { name: String },
    #[error("failed to fetch repository: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to install dependencies ({step}): {detail}")]
    DependencyInstall { step: String, detail: String },
    #[error("failed to build server ({step}): {detail}")]
    Build { step: String, detail: String },
    #[error("failed to determine execution configuration: {0}")]
    ExecutionResolution(#[from] ResolutionError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

fn at_version(version: &str) -> String {
    if version.is_empty() {
        String::new()
    } else {
        format!("@{version}")
    }
}

impl InstallError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Clone or checkout failures.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to clone {url}: {source}")]
    Clone { url: String, source: git2::Error },
    #[error("failed to checkout version {reference}: {source}")]
    Checkout {
        reference: String,
        source: git2::Error,
    },
    #[error("destination is not empty: {}", .0.display())]
    DestinationNotEmpty(PathBuf),
    #[error("failed to query remote {url}: {source}")]
    Remote { url: String, source: git2::Error },
}

/// No launch strategy applied to a built tree.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("could not determine execution method for server in {}", .0.display())]
    NoStrategy(PathBuf),
    #[error("expected binary not found: {}", .0.display())]
    MissingBinary(PathBuf),
    #[error("no package name found in {}", .0.display())]
    MissingPackageName(PathBuf),
    #[error("failed to read manifest {}: {source}", path.display())]
    ManifestIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Registry lookups and agent config file I/O.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("unknown agent type: {0}")]
    Lookup(String),
    #[error("no config path available for agent {0}")]
    NoConfigPath(String),
    #[error("could not determine {0} directory")]
    MissingDirectory(&'static str),
    #[error("{context} {}: {source}", path.display())]
    ConfigIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("expected a JSON object at the root of {}", .0.display())]
    InvalidDocument(PathBuf),
    #[error("{context} {}: {source}", path.display())]
    RegistryIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse agent registry {origin}: {source}")]
    RegistryParse {
        origin: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Aggregate(#[from] AggregateAgentError),
}

/// Per-agent failures collected during a fan-out.
#[derive(Debug, Default)]
pub struct AggregateAgentError {
    pub failures: Vec<AgentFailure>,
}

#[derive(Debug)]
pub struct AgentFailure {
    pub agent_type: String,
    pub error: AgentError,
}

impl AggregateAgentError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn push(&mut self, agent_type: impl Into<String>, error: AgentError) {
        self.failures.push(AgentFailure {
            agent_type: agent_type.into(),
            error,
        });
    }

    /// Agent types that failed, in the order they were attempted.
    pub fn failed_types(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|f| f.agent_type.as_str())
            .collect()
    }
}

impl fmt::Display for AggregateAgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed for some agents: ")?;
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.agent_type, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateAgentError {}

/// Project descriptor (`mcpv.json`) persistence.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize project descriptor: {0}")]
    Serialize(serde_json::Error),
    #[error("{} already exists, use --force to overwrite", .0.display())]
    AlreadyExists(PathBuf),
    #[error("server {name}@{version} not found in descriptor")]
    ServerNotFound { name: String, version: String },
}
