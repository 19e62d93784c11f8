//! Dependency installation and compilation of fetched trees.
//!
//! | ecosystem | dependency step                   | build step                      |
//! |-----------|-----------------------------------|---------------------------------|
//! | node      | `npm install`                     | `npm run build` (if declared)   |
//! | python    | `pip install -r requirements.txt` | none                            |
//! | go        | `go mod download`                 | `go build -o server .`          |
//! | rust      | none                              | `cargo build --release`         |

use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::ecosystem::Ecosystem;
use crate::ecosystem::node::NodeManifest;
use crate::error::InstallError;

/// One external process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

const NPM_INSTALL: Step = Step {
    program: "npm",
    args: &["install"],
};
const NPM_BUILD: Step = Step {
    program: "npm",
    args: &["run", "build"],
};
const PIP_INSTALL: Step = Step {
    program: "pip",
    args: &["install", "-r", "requirements.txt"],
};
const GO_DOWNLOAD: Step = Step {
    program: "go",
    args: &["mod", "download"],
};
const GO_BUILD: Step = Step {
    program: "go",
    args: &["build", "-o", "server", "."],
};
const CARGO_BUILD: Step = Step {
    program: "cargo",
    args: &["build", "--release"],
};

/// Runs a [`Step`] with the working directory set to the tree root.
pub trait StepRunner: Send + Sync {
    /// Returns a human-readable failure detail on spawn error or non-zero exit.
    fn run(&self, dir: &Path, step: &Step) -> Result<(), String>;
}

/// Spawns real processes, inheriting stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl StepRunner for SystemRunner {
    fn run(&self, dir: &Path, step: &Step) -> Result<(), String> {
        let status = Command::new(step.program)
            .args(step.args)
            .current_dir(dir)
            .status()
            .map_err(|err| format!("failed to run {step}: {err}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{step} exited with {status}"))
        }
    }
}

/// Steps to run for a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildPlan {
    pub dependencies: Option<Step>,
    pub build: Option<Step>,
}

impl BuildPlan {
    pub fn for_tree(dir: &Path, ecosystem: Ecosystem) -> Self {
        match ecosystem {
            Ecosystem::Node => {
                // An unreadable manifest has no build script.
                let has_build = NodeManifest::read(dir)
                    .map(|manifest| manifest.has_script("build"))
                    .unwrap_or(false);
                Self {
                    dependencies: Some(NPM_INSTALL),
                    build: has_build.then_some(NPM_BUILD),
                }
            }
            Ecosystem::Python => Self {
                dependencies: Some(PIP_INSTALL),
                build: None,
            },
            Ecosystem::Go => Self {
                dependencies: Some(GO_DOWNLOAD),
                build: Some(GO_BUILD),
            },
            Ecosystem::Rust => Self {
                dependencies: None,
                build: Some(CARGO_BUILD),
            },
            Ecosystem::Unknown => Self::default(),
        }
    }
}

/// Runs the dependency and build steps of a [`BuildPlan`].
pub struct Builder {
    runner: Box<dyn StepRunner>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder").finish_non_exhaustive()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(Box::new(SystemRunner))
    }
}

impl Builder {
    pub fn new(runner: Box<dyn StepRunner>) -> Self {
        Self { runner }
    }

    pub fn install_dependencies(&self, dir: &Path, ecosystem: Ecosystem) -> Result<(), InstallError> {
        let Some(step) = BuildPlan::for_tree(dir, ecosystem).dependencies else {
            debug!(%ecosystem, "no dependency step");
            return Ok(());
        };
        debug!(%step, dir = %dir.display(), "installing dependencies");
        self.runner
            .run(dir, &step)
            .map_err(|detail| InstallError::DependencyInstall {
                step: step.to_string(),
                detail,
            })
    }

    pub fn compile(&self, dir: &Path, ecosystem: Ecosystem) -> Result<(), InstallError> {
        let Some(step) = BuildPlan::for_tree(dir, ecosystem).build else {
            debug!(%ecosystem, "no build step");
            return Ok(());
        };
        debug!(%step, dir = %dir.display(), "building");
        self.runner.run(dir, &step).map_err(|detail| InstallError::Build {
            step: step.to_string(),
            detail,
        })
    }

    /// Dependency step then build step; the first failure stops the sequence.
    pub fn build(&self, dir: &Path, ecosystem: Ecosystem) -> Result<(), InstallError> {
        self.install_dependencies(dir, ecosystem)?;
        self.compile(dir, ecosystem)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;

    #[derive(Default, Clone)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl StepRunner for Recorder {
        fn run(&self, _dir: &Path, step: &Step) -> Result<(), String> {
            let name = step.to_string();
            self.calls.lock().unwrap().push(name.clone());
            if self.fail_on == Some(step.program) {
                return Err("exit status: 1".to_string());
            }
            Ok(())
        }
    }

    fn run_build(files: &[(&str, &str)], ecosystem: Ecosystem) -> Vec<String> {
        let temp = TempDir::new().unwrap();
        for (name, contents) in files {
            std::fs::write(temp.path().join(name), contents).unwrap();
        }
        let recorder = Recorder::default();
        Builder::new(Box::new(recorder.clone()))
            .build(temp.path(), ecosystem)
            .unwrap();
        recorder.calls.lock().unwrap().clone()
    }

    #[test]
    fn node_without_build_script_only_installs() {
        let calls = run_build(&[("package.json", r#"{"main":"index.js"}"#)], Ecosystem::Node);
        assert_eq!(calls, vec!["npm install"]);
    }

    #[test]
    fn node_with_build_script_builds() {
        let calls = run_build(
            &[("package.json", r#"{"scripts":{"build":"tsc"}}"#)],
            Ecosystem::Node,
        );
        assert_eq!(calls, vec!["npm install", "npm run build"]);
    }

    #[test]
    fn python_installs_requirements() {
        let calls = run_build(&[("requirements.txt", "mcp\n")], Ecosystem::Python);
        assert_eq!(calls, vec!["pip install -r requirements.txt"]);
    }

    #[test]
    fn go_downloads_then_builds_server_binary() {
        let calls = run_build(&[("go.mod", "module x\n")], Ecosystem::Go);
        assert_eq!(calls, vec!["go mod download", "go build -o server ."]);
    }

    #[test]
    fn rust_builds_release_only() {
        let calls = run_build(&[("Cargo.toml", "")], Ecosystem::Rust);
        assert_eq!(calls, vec!["cargo build --release"]);
    }

    #[test]
    fn unknown_runs_nothing() {
        let calls = run_build(&[], Ecosystem::Unknown);
        assert!(calls.is_empty());
    }

    #[test]
    fn dependency_failure_is_reported_with_step() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "").unwrap();
        let recorder = Recorder {
            fail_on: Some("go"),
            ..Recorder::default()
        };

        let err = Builder::new(Box::new(recorder.clone()))
            .build(temp.path(), Ecosystem::Go)
            .unwrap_err();

        match err {
            InstallError::DependencyInstall { step, detail } => {
                assert_eq!(step, "go mod download");
                assert!(detail.contains("exit status"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn build_failure_is_build_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Cargo.toml"), "").unwrap();
        let recorder = Recorder {
            fail_on: Some("cargo"),
            ..Recorder::default()
        };

        let err = Builder::new(Box::new(recorder))
            .build(temp.path(), Ecosystem::Rust)
            .unwrap_err();
        assert!(matches!(err, InstallError::Build { ref step, .. } if step == "cargo build --release"));
    }
}
