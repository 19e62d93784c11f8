//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::config::descriptor::DESCRIPTOR_FILE;
use crate::error::AgentError;

/// Environment variable that overrides the data home (install root parent).
pub const DATA_HOME_ENV: &str = "XDG_DATA_HOME";

const APP_DIR: &str = "mcpv";

/// Unified application context for dependency injection.
///
/// Every path the core touches is derived from this value; nothing reads the
/// process working directory. Frontends create it once and pass it down.
#[derive(Debug, Clone)]
pub struct AppContext {
    home_dir: PathBuf,
    project_root: PathBuf,
    install_root: PathBuf,
    config_dir: PathBuf,
}

impl AppContext {
    /// Build a context from the user's environment for the given project directory.
    ///
    /// - install root: `$XDG_DATA_HOME/mcpv`, else the platform data dir, else
    ///   `~/.local/share/mcpv`
    /// - config dir: the platform config dir joined with `mcpv`
    pub fn from_env(project_root: PathBuf) -> Result<Self, AgentError> {
        let home_dir = dirs::home_dir().ok_or(AgentError::MissingDirectory("home"))?;

        let install_root = match std::env::var_os(DATA_HOME_ENV) {
            Some(data_home) if !data_home.is_empty() => PathBuf::from(data_home).join(APP_DIR),
            _ => dirs::data_dir()
                .map(|p| p.join(APP_DIR))
                .unwrap_or_else(|| home_dir.join(".local").join("share").join(APP_DIR)),
        };

        let config_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| home_dir.join(".config").join(APP_DIR));

        Ok(Self {
            home_dir,
            project_root,
            install_root,
            config_dir,
        })
    }

    /// Create a context with explicit paths (for testing).
    pub fn with_paths(
        home_dir: PathBuf,
        project_root: PathBuf,
        install_root: PathBuf,
        config_dir: PathBuf,
    ) -> Self {
        Self {
            home_dir,
            project_root,
            install_root,
            config_dir,
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Base directory under which all `<name>/<version>` trees live.
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Directory holding the persisted agent registry.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Default location of the project descriptor.
    pub fn descriptor_path(&self) -> PathBuf {
        self.project_root.join(DESCRIPTOR_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lives_in_project_root() {
        let ctx = AppContext::with_paths(
            PathBuf::from("/home/u"),
            PathBuf::from("/work/proj"),
            PathBuf::from("/data/mcpv"),
            PathBuf::from("/cfg/mcpv"),
        );
        assert_eq!(ctx.descriptor_path(), PathBuf::from("/work/proj/mcpv.json"));
        assert_eq!(ctx.install_root(), Path::new("/data/mcpv"));
    }
}
