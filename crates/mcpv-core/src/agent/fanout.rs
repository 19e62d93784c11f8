//! Apply one config mutation across several agents.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use super::adapter::AgentConfigAdapter;
use super::registry::AgentRegistry;
use crate::context::AppContext;
use crate::error::{AgentError, AggregateAgentError};
use crate::install::ServerInstallation;

#[derive(Debug, Clone, Copy)]
pub enum AgentOp<'a> {
    Add(&'a ServerInstallation),
    Remove(&'a str),
}

impl AgentOp<'_> {
    fn apply(&self, adapter: &dyn AgentConfigAdapter) -> Result<(), AgentError> {
        match self {
            AgentOp::Add(installation) => adapter.add_entry(installation),
            AgentOp::Remove(name) => adapter.remove_entry(name).map(|_| ()),
        }
    }

    fn server(&self) -> &str {
        match self {
            AgentOp::Add(installation) => &installation.name,
            AgentOp::Remove(name) => name,
        }
    }
}

impl fmt::Display for AgentOp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentOp::Add(installation) => write!(f, "add {}", installation.name),
            AgentOp::Remove(name) => write!(f, "remove {name}"),
        }
    }
}

/// Apply `op` to a single agent; its failure is the caller's failure.
pub fn apply_to_agent(
    registry: &AgentRegistry,
    ctx: &AppContext,
    agent_type: &str,
    prefer_local: bool,
    op: AgentOp<'_>,
) -> Result<PathBuf, AgentError> {
    let adapter = registry.adapter(agent_type, ctx, prefer_local)?;
    op.apply(adapter.as_ref())?;
    info!(agent = agent_type, server = op.server(), path = %adapter.config_path().display(), "{op}");
    Ok(adapter.config_path().to_path_buf())
}

/// Apply `op` to each type independently.
///
/// Every type is attempted. Successful writes are kept even when others
/// fail; failures come back together as [`AgentError::Aggregate`].
pub fn apply_to_agents<S: AsRef<str>>(
    registry: &AgentRegistry,
    ctx: &AppContext,
    agent_types: &[S],
    prefer_local: bool,
    op: AgentOp<'_>,
) -> Result<Vec<String>, AgentError> {
    let mut updated = Vec::new();
    let mut failures = AggregateAgentError::default();

    for agent_type in agent_types {
        let agent_type = agent_type.as_ref();
        match apply_to_agent(registry, ctx, agent_type, prefer_local, op) {
            Ok(_) => updated.push(agent_type.to_string()),
            Err(err) => {
                warn!(agent = agent_type, error = %err, "{op} failed");
                failures.push(agent_type, err);
            }
        }
    }

    if failures.is_empty() {
        Ok(updated)
    } else {
        Err(failures.into())
    }
}

/// [`apply_to_agents`] over every detected agent, in type order.
pub fn apply_to_all_detected(
    registry: &AgentRegistry,
    ctx: &AppContext,
    prefer_local: bool,
    op: AgentOp<'_>,
) -> Result<Vec<String>, AgentError> {
    let detected = registry.detect(ctx);
    if detected.is_empty() {
        warn!("no agents detected");
    }
    apply_to_agents(registry, ctx, &detected, prefer_local, op)
}
