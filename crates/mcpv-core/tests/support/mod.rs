//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tempfile::TempDir;

use mcpv_core::agent::{AGENTS_FILE, AgentRegistry};
use mcpv_core::build::{Builder, Step, StepRunner};
use mcpv_core::context::AppContext;
use mcpv_core::error::FetchError;
use mcpv_core::git::{LATEST, RepositoryFetcher};
use mcpv_core::install::InstallOrchestrator;

pub const NODE_MANIFEST: (&str, &str) = ("package.json", r#"{"main":"index.js"}"#);

/// Writes fixture files instead of cloning.
#[derive(Clone, Default)]
pub struct FixtureFetcher {
    pub files: Vec<(String, String)>,
    pub fail: bool,
    pub latest: Option<String>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl FixtureFetcher {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(name, contents)| (name.to_string(), contents.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl RepositoryFetcher for FixtureFetcher {
    fn fetch(&self, url: &str, reference: &str, destination: &Path) -> Result<(), FetchError> {
        self.fetched
            .lock()
            .unwrap()
            .push(format!("{url}#{reference}"));
        if self.fail {
            return Err(FetchError::Clone {
                url: url.to_string(),
                source: git2::Error::from_str("repository not found"),
            });
        }
        for (name, contents) in &self.files {
            let path = destination.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        Ok(())
    }

    fn latest_version(&self, _url: &str) -> Result<String, FetchError> {
        Ok(self.latest.clone().unwrap_or_else(|| LATEST.to_string()))
    }
}

/// Records steps instead of spawning processes.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StepRunner for RecordingRunner {
    fn run(&self, _dir: &Path, step: &Step) -> Result<(), String> {
        let line = step.to_string();
        self.calls.lock().unwrap().push(line.clone());
        if self.fail_on.as_deref() == Some(line.as_str()) {
            return Err("exit status: 1".to_string());
        }
        Ok(())
    }
}

pub fn context(temp: &TempDir) -> AppContext {
    let ctx = AppContext::with_paths(
        temp.path().join("home"),
        temp.path().join("project"),
        temp.path().join("data").join("mcpv"),
        temp.path().join("config").join("mcpv"),
    );
    std::fs::create_dir_all(ctx.home_dir()).unwrap();
    std::fs::create_dir_all(ctx.project_root()).unwrap();
    ctx
}

pub fn orchestrator(
    ctx: &AppContext,
    fetcher: FixtureFetcher,
    runner: RecordingRunner,
) -> InstallOrchestrator {
    InstallOrchestrator::new(
        ctx.install_root().to_path_buf(),
        Box::new(fetcher),
        Builder::new(Box::new(runner)),
    )
}

/// Agent spec detected through `~/.<agent_type>` with its config at
/// `~/<agent_type>/config.json` and a project-local `.<agent_type>.json`.
pub fn agent_spec(agent_type: &str) -> Value {
    json!({
        "name": agent_type.to_uppercase(),
        "type": agent_type,
        "description": format!("{agent_type} test agent"),
        "config": {
            "path": format!("~/{agent_type}/config.json"),
            "local_path": format!(".{agent_type}.json"),
            "format": "json",
        },
        "detection": {"paths": [format!("~/.{agent_type}")], "commands": []},
    })
}

/// Registry holding `agents`, persisted under the context's config dir.
pub fn registry(ctx: &AppContext, version: &str, agents: &[&str]) -> AgentRegistry {
    let agents: serde_json::Map<String, Value> = agents
        .iter()
        .map(|agent_type| (agent_type.to_string(), agent_spec(agent_type)))
        .collect();
    let document = json!({"version": version, "agents": agents});
    AgentRegistry::from_json(&document.to_string(), "test")
        .unwrap()
        .with_path(ctx.config_dir().join(AGENTS_FILE))
}

/// Make an agent's detection path exist.
pub fn install_agent(ctx: &AppContext, agent_type: &str) {
    std::fs::create_dir_all(ctx.home_dir().join(format!(".{agent_type}"))).unwrap();
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
