//! Data-driven agent catalog.
//!
//! Every supported agent is described by an [`AgentSpec`] in the
//! [`AgentRegistry`]; a single generic adapter ([`RegistryAgentConfig`])
//! locates and patches each agent's config file from that data alone, so a
//! new agent needs a registry entry, not new code.

mod adapter;
mod fanout;
mod paths;
mod registry;
mod spec;

pub use adapter::{AgentConfigAdapter, RegistryAgentConfig};
pub use fanout::{AgentOp, apply_to_agent, apply_to_agents, apply_to_all_detected};
pub use paths::expand_path;
pub use registry::{AGENTS_FILE, AgentRegistry};
pub use spec::{AgentSpec, ConfigDirectorySpec, ConfigSpec, DetectionSpec};
