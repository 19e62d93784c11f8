//! Persisted documents: the project descriptor and external agent config files.

pub mod descriptor;
pub mod document;

pub use descriptor::{DESCRIPTOR_FILE, ProjectDescriptor};
pub use document::{AgentConfigDocument, DEFAULT_SERVERS_KEY};
