//! mcpv - versioned MCP server manager
//!
//! Usage:
//!   mcpv init --agent cursor        # Create mcpv.json
//!   mcpv install                    # Install everything in mcpv.json
//!   mcpv install srv@1.0.0 --repo <url>
//!   mcpv agents list                # Detected agents and config paths

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcpv_core::agent::AgentSpec;
use mcpv_core::context::AppContext;
use mcpv_core::error::{Error, InstallError};
use mcpv_core::install::ServerInstallation;
use mcpv_core::orchestration::{McpvService, parse_server_spec, validate_version};

#[derive(Parser)]
#[command(name = "mcpv")]
#[command(about = "Versioned MCP server manager", long_about = None)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Path to the project descriptor (defaults to <project>/mcpv.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new mcpv.json in the project directory
    Init {
        /// Default agent for this project
        #[arg(short, long)]
        agent: String,
        /// Overwrite an existing mcpv.json
        #[arg(short, long)]
        force: bool,
    },

    /// Install servers from mcpv.json, or the given name@version specs
    #[command(alias = "i")]
    Install(InstallArgs),

    /// Remove installed servers (all versions when no @version is given)
    #[command(alias = "rm")]
    Remove {
        /// Servers as name or name@version
        #[arg(required = true)]
        specs: Vec<String>,
    },

    /// List installed servers
    List {
        /// List servers declared in mcpv.json instead
        #[arg(long)]
        project: bool,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Install the newest tagged version of every declared server
    Update,

    /// Manage agent configurations
    Agents(AgentsArgs),
}

#[derive(Args)]
struct InstallArgs {
    /// Servers as name or name@version
    specs: Vec<String>,
    /// Repository to install the given specs from
    #[arg(long)]
    repo: Option<String>,
    /// Register with this agent only
    #[arg(short, long)]
    agent: Option<String>,
    /// Use the agent's global config instead of the project-local one
    #[arg(short, long)]
    global: bool,
}

#[derive(Args)]
struct AgentsArgs {
    #[command(subcommand)]
    command: AgentsSubcommand,
}

#[derive(Subcommand)]
enum AgentsSubcommand {
    /// List detected agents and their config paths
    List,
    /// Add an installed server to one agent
    Add {
        server: String,
        agent: String,
        /// Use the agent's global config instead of the project-local one
        #[arg(short, long)]
        global: bool,
    },
    /// Remove a server from every detected agent
    Remove { server: String },
    /// Register a custom agent from a JSON spec file
    Register { agent: String, spec: PathBuf },
    /// Remove an agent from the registry
    Unregister { agent: String },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcpv=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let project = match cli.project {
        Some(project) => project,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let ctx = AppContext::from_env(project)?;
    tracing::debug!(
        project = %ctx.project_root().display(),
        install_root = %ctx.install_root().display(),
        "resolved context"
    );
    let mut service = McpvService::from_context(ctx, cli.config)?;

    match cli.command {
        Commands::Init { agent, force } => run_init(&service, &agent, force),
        Commands::Install(args) => run_install(&service, args),
        Commands::Remove { specs } => run_remove(&service, &specs),
        Commands::List { project, format } => run_list(&service, project, format),
        Commands::Update => run_update(&service),
        Commands::Agents(args) => run_agents(&mut service, args.command),
    }
}

fn run_init(service: &McpvService, agent: &str, force: bool) -> Result<()> {
    let path = service.init_project(agent, force)?;
    println!("Created {} with default agent {agent}", path.display());
    Ok(())
}

fn run_install(service: &McpvService, args: InstallArgs) -> Result<()> {
    let prefer_local = !args.global;

    if args.specs.is_empty() {
        if !service.descriptor_path().exists() {
            bail!(
                "No mcpv.json found at {}. Use 'mcpv init' to create one or specify a server directly",
                service.descriptor_path().display()
            );
        }
        let report = service.install_from_descriptor(args.agent.as_deref(), prefer_local)?;
        for server in &report.servers {
            let state = if server.fresh {
                "installed"
            } else {
                "already installed"
            };
            println!(
                "{}@{} {state}{}",
                server.installation.name,
                server.installation.version,
                agents_suffix(&server.agents)
            );
        }
        print_warnings(&report.warnings);
        return Ok(());
    }

    let Some(repo) = args.repo.as_deref() else {
        bail!("Installing a specific server requires --repo <repository-url>");
    };
    for spec in &args.specs {
        let (name, version) = parse_server_spec(spec);
        validate_version(version)?;
        match service.install_server(name, version, repo, args.agent.as_deref(), prefer_local) {
            Ok(server) => println!(
                "{}@{} installed{}",
                server.installation.name,
                server.installation.version,
                agents_suffix(&server.agents)
            ),
            Err(Error::Install(InstallError::AlreadyInstalled { name, version, .. })) => {
                println!("{name}@{version} is already installed");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to install {spec}"));
            }
        }
    }
    Ok(())
}

fn run_remove(service: &McpvService, specs: &[String]) -> Result<()> {
    for spec in specs {
        let (name, version) = parse_server_spec(spec);
        let version = (!version.is_empty()).then_some(version);
        let report = service.remove_server(name, version)?;
        for version in &report.removed_versions {
            println!("Removed {name}@{version}");
        }
        if report.descriptor_entries > 0 {
            println!(
                "Removed {} entr{} from {}",
                report.descriptor_entries,
                if report.descriptor_entries == 1 { "y" } else { "ies" },
                service.descriptor_path().display()
            );
        }
        print_warnings(&report.warnings);
    }
    Ok(())
}

fn run_list(service: &McpvService, project: bool, format: OutputFormat) -> Result<()> {
    let servers = if project {
        service.list_project()?.servers
    } else {
        service.list_installed()?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&servers)?),
        OutputFormat::Table => print_servers(&servers, project),
    }
    Ok(())
}

fn print_servers(servers: &[ServerInstallation], project: bool) {
    if servers.is_empty() {
        println!("No servers {}", if project { "declared" } else { "installed" });
        return;
    }
    for server in servers {
        let version = if server.version.is_empty() {
            "latest"
        } else {
            server.version.as_str()
        };
        match (&server.install_path, project) {
            (Some(path), false) => println!("{}@{version}  {}", server.name, path.display()),
            _ => println!("{}@{version}  {}", server.name, server.repository),
        }
    }
}

fn run_update(service: &McpvService) -> Result<()> {
    let report = service.update_from_descriptor()?;
    for server in &report.updated {
        println!("Updated {}@{}", server.name, server.version);
    }
    for current in &report.up_to_date {
        println!("{current} is up to date");
    }
    for name in &report.skipped {
        println!("Skipping {name}: no repository specified");
    }
    for (name, err) in &report.failures {
        eprintln!("Failed to update {name}: {err}");
    }
    Ok(())
}

fn run_agents(service: &mut McpvService, command: AgentsSubcommand) -> Result<()> {
    match command {
        AgentsSubcommand::List => {
            let agents = service.agents_overview();
            if agents.is_empty() {
                println!("No supported agents detected.");
                return Ok(());
            }
            println!("Detected agents:");
            for agent in agents {
                match agent.config_path {
                    Ok(path) => println!("- {} ({}): {}", agent.agent_type, agent.name, path.display()),
                    Err(err) => println!("- {} ({}): {err}", agent.agent_type, agent.name),
                }
            }
        }
        AgentsSubcommand::Add {
            server,
            agent,
            global,
        } => {
            let path = service.add_server_to_agent(&server, &agent, !global)?;
            println!("Added {server} to {agent} ({})", path.display());
        }
        AgentsSubcommand::Remove { server } => {
            let agents = service.remove_server_from_agents(&server)?;
            println!("Removed {server} from {} agent config(s)", agents.len());
        }
        AgentsSubcommand::Register { agent, spec } => {
            let content = std::fs::read_to_string(&spec)
                .with_context(|| format!("Failed to read agent spec: {}", spec.display()))?;
            let parsed: AgentSpec = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse agent spec: {}", spec.display()))?;
            service.register_custom_agent(&agent, parsed)?;
            println!("Registered agent {agent}");
        }
        AgentsSubcommand::Unregister { agent } => {
            service.unregister_custom_agent(&agent)?;
            println!("Unregistered agent {agent}");
        }
    }
    Ok(())
}

fn agents_suffix(agents: &[String]) -> String {
    if agents.is_empty() {
        String::new()
    } else {
        format!(" (configured for {})", agents.join(", "))
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("Warning: {warning}");
    }
}
