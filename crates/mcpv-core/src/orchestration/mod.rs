//! End-to-end flows combining installs, the project descriptor and agent configs.

mod service;
mod uninstall;

pub use service::{
    AgentOverview, AgentTarget, InstallReport, InstalledServer, McpvService, UpdateReport,
    parse_server_spec, validate_version,
};
pub use uninstall::RemovalReport;
