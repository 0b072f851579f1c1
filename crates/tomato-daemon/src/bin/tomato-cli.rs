//! A thin shim over `TopologyService` for local operability. Not a
//! replacement for the out-of-scope RPC/web frontend — just
//! enough to create a topology, list what's on disk, and inspect one
//! without a running daemon process.

use clap::{Parser, Subcommand};
use tomato_core::config::Config;
use tomato_topology::permissions::{Caller, UserId};

#[derive(Parser)]
#[command(name = "tomato-cli")]
#[command(about = "Operator CLI for the tomato control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Topology operations.
    Topology {
        #[command(subcommand)]
        action: TopologyCommand,
    },
}

#[derive(Subcommand)]
enum TopologyCommand {
    /// List every topology's id.
    List,
    /// Show one topology's elements, connections, and timeout state.
    Info {
        /// Topology id (uuid).
        id: String,
    },
    /// Create a new, empty topology owned by the given user.
    Create {
        /// Login of the owning user.
        owner: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tomato_telemetry::init_logging("tomato-cli", "warn");

    let cli = Cli::parse();
    let config = Config::load()?;
    let service = tomato_daemon::build_service(&config).await?;

    match cli.command {
        Commands::Topology { action } => match action {
            TopologyCommand::List => {
                for id in service.list().await? {
                    println!("{id}");
                }
            }
            TopologyCommand::Create { owner } => {
                let id = service.create(UserId::new(owner)).await?;
                println!("{id}");
            }
            TopologyCommand::Info { id } => {
                let id: tomato_core::ids::TopologyId = id
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid topology id: {id}"))?;
                // Any caller with at least User role can read; an operator
                // inspecting from the command line acts as the global admin.
                let caller = Caller::global_admin(UserId::new("tomato-cli"));
                let topo = service.info(id, &caller).await?;
                println!("id:           {}", topo.id);
                println!("name:         {}", topo.name);
                println!("timeout:      {}", topo.timeout);
                println!("timeout_step: {}", topo.timeout_step);
                println!("elements:     {}", topo.elements.len());
                println!("connections:  {}", topo.connections.len());
            }
        },
    }

    Ok(())
}
