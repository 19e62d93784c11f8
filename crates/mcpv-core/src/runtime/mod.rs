//! Launch command resolution for built server trees.
//!
//! Resolution only reads the tree; it never triggers a build. Given identical
//! contents it always yields the same [`RunnerSpec`].
//!
//! | ecosystem | command               | args                                  |
//! |-----------|-----------------------|---------------------------------------|
//! | node      | `node`                | `<dir>/<bin or main or index.js>`     |
//! | python    | `python`              | `<dir>/main.py`, `<dir>/__main__.py`, or `-m <basename>` |
//! | go        | `<dir>/server`        | none                                  |
//! | rust      | `<dir>/target/release/<name>` | none                          |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ecosystem::Ecosystem;
use crate::ecosystem::node::NodeManifest;
use crate::error::ResolutionError;

const NODE: &str = "node";
const PYTHON: &str = "python";
const GO_BINARY: &str = "server";
const CARGO_MANIFEST: &str = "Cargo.toml";

/// Executable specification - the final output of runtime resolution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunnerSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl RunnerSpec {
    fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: BTreeMap::new(),
        }
    }
}

pub fn resolve(dir: &Path, ecosystem: Ecosystem) -> Result<RunnerSpec, ResolutionError> {
    match ecosystem {
        Ecosystem::Node => resolve_node(dir),
        Ecosystem::Python => Ok(resolve_python(dir)),
        Ecosystem::Go => resolve_go(dir),
        Ecosystem::Rust => resolve_rust(dir),
        Ecosystem::Unknown => Err(ResolutionError::NoStrategy(dir.to_path_buf())),
    }
}

fn resolve_node(dir: &Path) -> Result<RunnerSpec, ResolutionError> {
    let manifest = NodeManifest::read(dir)?;
    let entry = manifest.entry_point().unwrap_or("index.js");
    Ok(RunnerSpec::new(NODE, vec![path_arg(&dir.join(entry))]))
}

fn resolve_python(dir: &Path) -> RunnerSpec {
    for script in ["main.py", "__main__.py"] {
        let path = dir.join(script);
        if path.exists() {
            return RunnerSpec::new(PYTHON, vec![path_arg(&path)]);
        }
    }
    let module = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    RunnerSpec::new(PYTHON, vec!["-m".to_string(), module])
}

fn resolve_go(dir: &Path) -> Result<RunnerSpec, ResolutionError> {
    let binary = dir.join(GO_BINARY);
    if !binary.exists() {
        return Err(ResolutionError::MissingBinary(binary));
    }
    Ok(RunnerSpec::new(path_arg(&binary), Vec::new()))
}

fn resolve_rust(dir: &Path) -> Result<RunnerSpec, ResolutionError> {
    let manifest = dir.join(CARGO_MANIFEST);
    let contents =
        std::fs::read_to_string(&manifest).map_err(|source| ResolutionError::ManifestIo {
            path: manifest.clone(),
            source,
        })?;
    let name = cargo_package_name(&contents)
        .ok_or_else(|| ResolutionError::MissingPackageName(manifest.clone()))?;
    let binary = release_binary(dir, name);
    if !binary.exists() {
        return Err(ResolutionError::MissingBinary(binary));
    }
    Ok(RunnerSpec::new(path_arg(&binary), Vec::new()))
}

/// First `name = "..."` line of a Cargo manifest.
///
/// This is a plain line scan: it does not track TOML tables, so a
/// `name = ` line in a section before `[package]` wins.
pub fn cargo_package_name(manifest: &str) -> Option<&str> {
    manifest.lines().find_map(|line| {
        line.trim()
            .strip_prefix("name = ")
            .map(|value| value.trim().trim_matches('"'))
    })
}

fn release_binary(dir: &Path, name: &str) -> PathBuf {
    let file = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };
    dir.join("target").join("release").join(file)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
