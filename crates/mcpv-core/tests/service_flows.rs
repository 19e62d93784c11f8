mod support;

use serde_json::json;
use tempfile::TempDir;

use mcpv_core::config::ProjectDescriptor;
use mcpv_core::context::AppContext;
use mcpv_core::error::{AgentError, DescriptorError, Error, InstallError};
use mcpv_core::install::ServerInstallation;
use mcpv_core::orchestration::McpvService;

use support::{
    FixtureFetcher, NODE_MANIFEST, RecordingRunner, context, install_agent, orchestrator,
    read_json, registry,
};

fn service(ctx: &AppContext, fetcher: FixtureFetcher, runner: RecordingRunner) -> McpvService {
    McpvService::new(
        ctx.clone(),
        orchestrator(ctx, fetcher, runner),
        registry(ctx, "1.0", &["alpha", "beta"]),
    )
}

fn write_descriptor(ctx: &AppContext, descriptor: &ProjectDescriptor) {
    descriptor.save(&ctx.descriptor_path()).unwrap();
}

fn declared(name: &str, version: &str) -> ServerInstallation {
    ServerInstallation::declared(name, version, format!("https://git.example/{name}"))
}

#[test]
fn descriptor_install_is_idempotent_and_registers_detected_agents() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    let runner = RecordingRunner::default();
    let svc = service(&ctx, FixtureFetcher::with_files(&[NODE_MANIFEST]), runner.clone());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let first = svc.install_from_descriptor(None, false).unwrap();
    let second = svc.install_from_descriptor(None, false).unwrap();

    assert!(first.servers[0].fresh);
    assert!(!second.servers[0].fresh);
    assert_eq!(second.servers[0].agents, vec!["alpha"]);
    assert_eq!(runner.calls(), vec!["npm install"]);

    let script = svc.installer().install_path("weather", "1.0.0").join("index.js");
    let config = read_json(&ctx.home_dir().join("alpha/config.json"));
    assert_eq!(
        config["mcpServers"]["weather"],
        json!({"command": "node", "args": [script.to_string_lossy()]})
    );
}

#[test]
fn repeated_descriptor_installs_write_the_same_agent_entry() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    let mut server = declared("weather", "1.0.0");
    server.command = "node".to_string();
    server.args = vec!["srv.js".to_string()];
    server.env.insert("API_KEY".to_string(), "secret".to_string());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(server);
    write_descriptor(&ctx, &descriptor);
    let config_path = ctx.home_dir().join("alpha/config.json");

    svc.install_from_descriptor(None, false).unwrap();
    let first = read_json(&config_path)["mcpServers"]["weather"].clone();
    svc.install_from_descriptor(None, false).unwrap();
    let second = read_json(&config_path)["mcpServers"]["weather"].clone();

    assert_eq!(first, second);
    assert_eq!(
        first,
        json!({"command": "node", "args": ["srv.js"], "env": {"API_KEY": "secret"}})
    );
}

#[test]
fn unresolvable_existing_install_is_not_registered() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    let svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());
    let tree = svc.installer().install_path("gosrv", "1.0.0");
    std::fs::create_dir_all(&tree).unwrap();
    std::fs::write(tree.join("go.mod"), "module x").unwrap();
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("gosrv", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let report = svc.install_from_descriptor(None, false).unwrap();

    assert!(report.servers[0].agents.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("gosrv@1.0.0"));
    assert!(!ctx.home_dir().join("alpha/config.json").exists());
}

#[test]
fn descriptor_install_defaults_missing_version_to_latest() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let fetcher = FixtureFetcher::with_files(&[NODE_MANIFEST]);
    let svc = service(&ctx, fetcher.clone(), RecordingRunner::default());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("weather", ""));
    write_descriptor(&ctx, &descriptor);

    let report = svc.install_from_descriptor(None, false).unwrap();

    assert_eq!(report.servers[0].installation.version, "latest");
    assert!(svc.installer().is_installed("weather", "latest"));
    assert_eq!(
        *fetcher.fetched.lock().unwrap(),
        vec!["https://git.example/weather#latest"]
    );
}

#[test]
fn descriptor_install_requires_repository() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(ServerInstallation::declared("weather", "1.0.0", ""));
    write_descriptor(&ctx, &descriptor);

    let err = svc.install_from_descriptor(None, false).unwrap_err();
    assert!(matches!(
        err,
        Error::Install(InstallError::MissingRepository { .. })
    ));
}

#[test]
fn detected_agent_failures_are_warnings() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    install_agent(&ctx, "beta");
    std::fs::write(ctx.home_dir().join("beta"), "").unwrap();
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let report = svc.install_from_descriptor(None, false).unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("beta"));
    assert!(svc.installer().is_installed("weather", "1.0.0"));
    assert!(ctx.home_dir().join("alpha/config.json").exists());
}

#[test]
fn default_agent_failure_propagates() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    std::fs::write(ctx.home_dir().join("beta"), "").unwrap();
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    let mut descriptor = ProjectDescriptor::new(Some("beta".to_string()));
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let err = svc.install_from_descriptor(None, false).unwrap_err();

    assert!(matches!(err, Error::Agent(AgentError::ConfigIo { .. })));
    assert!(svc.installer().is_installed("weather", "1.0.0"));
}

#[test]
fn explicit_agent_overrides_default_and_prefers_local() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    let mut descriptor = ProjectDescriptor::new(Some("beta".to_string()));
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let report = svc.install_from_descriptor(Some("alpha"), true).unwrap();

    assert_eq!(report.servers[0].agents, vec!["alpha"]);
    assert!(ctx.project_root().join(".alpha.json").exists());
    assert!(!ctx.project_root().join(".beta.json").exists());
}

#[test]
fn unknown_agent_is_rejected_before_installing() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );

    let err = svc
        .install_server("weather", "1.0.0", "https://x", Some("nope"), false)
        .unwrap_err();

    assert!(matches!(err, Error::Agent(AgentError::Lookup(_))));
    assert!(!svc.installer().is_installed("weather", "1.0.0"));
}

#[test]
fn install_server_records_execution_in_descriptor() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    let mut descriptor = ProjectDescriptor::new(Some("alpha".to_string()));
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let installed = svc
        .install_server("weather", "1.0.0", "https://git.example/weather", None, false)
        .unwrap();

    assert_eq!(installed.agents, vec!["alpha"]);
    let stored = svc.list_project().unwrap();
    assert_eq!(stored.servers.len(), 1);
    assert_eq!(stored.servers[0].command, "node");
    assert!(stored.servers[0].installed);
}

#[test]
fn remove_all_versions_cleans_disk_agents_and_descriptor() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    for version in ["1.0.0", "2.0.0"] {
        svc.install_server("weather", version, "https://x", None, false)
            .unwrap();
    }

    let report = svc.remove_server("weather", None).unwrap();

    assert_eq!(report.removed_versions, vec!["1.0.0", "2.0.0"]);
    assert_eq!(report.descriptor_entries, 2);
    assert!(report.warnings.is_empty());
    assert!(!ctx.install_root().join("weather").exists());
    let config = read_json(&ctx.home_dir().join("alpha/config.json"));
    assert_eq!(config["mcpServers"], json!({}));
}

#[test]
fn remove_missing_version_still_updates_descriptor() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("weather", "1.0.0"));
    write_descriptor(&ctx, &descriptor);

    let report = svc.remove_server("weather", Some("1.0.0")).unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("not installed"));
    assert_eq!(report.descriptor_entries, 1);
    assert!(svc.list_project().unwrap().servers.is_empty());
}

#[test]
fn init_project_validates_agent_and_existing_file() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());

    assert!(matches!(
        svc.init_project("nope", false),
        Err(Error::Agent(AgentError::Lookup(_)))
    ));

    let path = svc.init_project("alpha", false).unwrap();
    assert_eq!(
        ProjectDescriptor::load(&path).unwrap().default_agent.as_deref(),
        Some("alpha")
    );
    assert!(matches!(
        svc.init_project("beta", false),
        Err(Error::Descriptor(DescriptorError::AlreadyExists(_)))
    ));
    svc.init_project("beta", true).unwrap();
    assert_eq!(
        ProjectDescriptor::load(&path).unwrap().default_agent.as_deref(),
        Some("beta")
    );
}

#[test]
fn update_installs_newest_tag_once() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let fetcher = FixtureFetcher {
        latest: Some("v2.0.0".to_string()),
        ..FixtureFetcher::with_files(&[NODE_MANIFEST])
    };
    let svc = service(&ctx, fetcher, RecordingRunner::default());
    let mut descriptor = ProjectDescriptor::default();
    descriptor.upsert_server(declared("weather", "1.0.0"));
    descriptor.upsert_server(ServerInstallation::declared("local-only", "1.0.0", ""));
    write_descriptor(&ctx, &descriptor);

    let first = svc.update_from_descriptor().unwrap();
    assert_eq!(first.updated.len(), 1);
    assert_eq!(first.updated[0].version, "v2.0.0");
    assert_eq!(first.skipped, vec!["local-only"]);

    let second = svc.update_from_descriptor().unwrap();
    assert!(second.updated.is_empty());
    assert_eq!(second.up_to_date, vec!["weather@v2.0.0"]);
}

#[test]
fn add_server_to_agent_uses_highest_installed_version() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let svc = service(
        &ctx,
        FixtureFetcher::with_files(&[NODE_MANIFEST]),
        RecordingRunner::default(),
    );
    for version in ["1.2.0", "1.10.0"] {
        svc.installer()
            .install("weather", version, "https://x")
            .unwrap();
    }

    let path = svc.add_server_to_agent("weather", "beta", false).unwrap();

    let script = svc.installer().install_path("weather", "1.10.0").join("index.js");
    assert_eq!(
        read_json(&path)["mcpServers"]["weather"]["args"],
        json!([script.to_string_lossy()])
    );
    assert!(matches!(
        svc.add_server_to_agent("ghost", "beta", false),
        Err(Error::Install(InstallError::NotInstalled { .. }))
    ));
}

#[test]
fn remove_server_from_agents_reports_failures() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    install_agent(&ctx, "alpha");
    install_agent(&ctx, "beta");
    std::fs::create_dir_all(ctx.home_dir().join("beta")).unwrap();
    std::fs::write(ctx.home_dir().join("beta/config.json"), "not json").unwrap();
    let svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());

    let err = svc.remove_server_from_agents("weather").unwrap_err();

    let Error::Agent(AgentError::Aggregate(aggregate)) = err else {
        panic!("expected aggregate error");
    };
    assert_eq!(aggregate.failed_types(), vec!["beta"]);
}

#[test]
fn custom_agents_register_and_unregister() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let mut svc = service(&ctx, FixtureFetcher::default(), RecordingRunner::default());
    let spec = svc.registry().get("alpha").unwrap().clone();

    svc.register_custom_agent("delta", spec).unwrap();
    assert!(svc.registry().get("delta").is_some());

    svc.unregister_custom_agent("delta").unwrap();
    assert!(matches!(
        svc.unregister_custom_agent("delta"),
        Err(Error::Agent(AgentError::Lookup(_)))
    ));
}
