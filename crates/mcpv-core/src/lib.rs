//! mcpv core library
//!
//! Installs versioned MCP servers from git repositories and keeps agent
//! configuration files in sync with what is installed.

pub mod agent;
pub mod build;
pub mod config;
pub mod context;
pub mod ecosystem;
pub mod error;
pub mod git;
pub mod install;
pub mod orchestration;
pub mod runtime;

/// Re-exports of commonly used types
pub mod prelude {
    // Context and errors
    pub use crate::context::AppContext;
    pub use crate::error::{AgentError, Error, InstallError, Result};

    // Install pipeline
    pub use crate::build::{Builder, StepRunner, SystemRunner};
    pub use crate::ecosystem::Ecosystem;
    pub use crate::git::{GitFetcher, RepositoryFetcher};
    pub use crate::install::{InstallOrchestrator, InstallOutcome, ServerInstallation};
    pub use crate::runtime::RunnerSpec;

    // Agents
    pub use crate::agent::{AgentConfigAdapter, AgentOp, AgentRegistry, AgentSpec};

    // Project
    pub use crate::config::ProjectDescriptor;
    pub use crate::orchestration::{AgentTarget, McpvService};
}
