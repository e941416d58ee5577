//! aggsig Command Line Interface
//!
//! Usage:
//!   aggsig start     - Run a signer node
//!   aggsig keygen    - Create or show a signer identity
//!   aggsig status    - Show node health and gossip stats
//!   aggsig peers     - List known peers
//!   aggsig signers   - Select a signing committee

use aggsig_core::{init_logging, NodeConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "aggsig")]
#[command(about = "BLS aggregate-signature signer node")]
#[command(version)]
struct Cli {
    /// Environment file loaded before reading AGGSIG_* variables
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a signer node (API, gossip and timers)
    Start {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Bootstrap gossip endpoint (repeatable)
        #[arg(short, long = "bootstrap")]
        bootstrap: Vec<String>,
    },

    /// Create a signer identity, or show the existing one
    Keygen {
        /// Identity file
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Node id (derived from the public key when omitted)
        #[arg(short, long)]
        node_id: Option<String>,
    },

    /// Show node status
    Status {
        /// API server URL
        #[arg(short, long, default_value = "http://localhost:3001")]
        api_url: String,
    },

    /// List known peers
    Peers {
        /// API server URL
        #[arg(short, long, default_value = "http://localhost:3001")]
        api_url: String,
        /// Only nodes currently eligible for signing
        #[arg(long)]
        active: bool,
    },

    /// Select a signing committee
    Signers {
        /// API server URL
        #[arg(short, long, default_value = "http://localhost:3001")]
        api_url: String,
        /// Committee size
        #[arg(short, long)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing env file is fine, settings may come from the environment
    let _ = dotenvy::from_path(&cli.env_file);

    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logging(&config.log) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run_command(cli.command, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(
    command: Commands,
    mut config: NodeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match command {
        Commands::Start {
            host,
            port,
            bootstrap,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if !bootstrap.is_empty() {
                config.bootstrap_peers = bootstrap;
            }
            commands::run_node(config).await
        }

        Commands::Keygen { out, node_id } => {
            let path = out.unwrap_or_else(|| config.identity_path.clone());
            commands::handle_keygen(path, node_id.or(config.node_id)).await
        }

        Commands::Status { api_url } => commands::handle_status(&api_url).await,

        Commands::Peers { api_url, active } => commands::handle_peers(&api_url, active).await,

        Commands::Signers { api_url, count } => commands::handle_signers(&api_url, count).await,
    }
}
