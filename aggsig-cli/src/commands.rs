//! Command handlers for the CLI

use aggsig_api::{start_background_server, ApiConfig, AppState};
use aggsig_core::NodeConfig;
use aggsig_signer::SignerIdentity;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};

type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Run a node until Ctrl-C
pub async fn run_node(config: NodeConfig) -> CmdResult {
    config.validate()?;

    let identity = SignerIdentity::load_or_create(&config.identity_path, config.node_id.clone())?;
    info!(
        node_id = %identity.node_id(),
        registration = %identity.registration_status(),
        "Signer identity ready"
    );

    let state = AppState::from_config(&config, identity)?;
    let gossip = state.gossip.clone();

    // Serve /gossip before bootstrapping so peers can dial back
    let addr = start_background_server(ApiConfig::from(&config), state).await?;
    info!(%addr, "API server listening");

    if let Err(e) = gossip.start().await {
        error!(error = %e, "Gossip startup failed");
        gossip.shutdown().await;
        return Err(e.into());
    }
    info!(
        node_id = %gossip.node_id(),
        bootstrap = config.bootstrap_peers.len(),
        "Node started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    gossip.shutdown().await;

    Ok(())
}

/// Create or show a signer identity
pub async fn handle_keygen(path: PathBuf, node_id: Option<String>) -> CmdResult {
    let identity = SignerIdentity::load_or_create(&path, node_id)?;

    println!("Signer identity: {}", path.display());
    println!("  Node ID: {}", identity.node_id());
    println!("  Public key: {}", identity.public_key_hex());
    println!("  Registration: {}", identity.registration_status());
    println!("  Created: {}", identity.created_at());
    Ok(())
}

/// Print /health and /stats
pub async fn handle_status(api_url: &str) -> CmdResult {
    println!("Checking aggsig node status at {}...", api_url);

    let health = get_json(&format!("{}/health", api_url)).await?;
    let stats = get_json(&format!("{}/stats", api_url)).await?;

    println!("Health: {}", serde_json::to_string_pretty(&health)?);
    println!("Stats: {}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Print the peer directory
pub async fn handle_peers(api_url: &str, active: bool) -> CmdResult {
    let path = if active { "nodes/active" } else { "nodes" };
    let body = get_json(&format!("{}/{}", api_url, path)).await?;

    let nodes = body["nodes"].as_array().cloned().unwrap_or_default();
    println!("{} peer(s)", nodes.len());
    for node in nodes {
        print_node(&node);
    }
    Ok(())
}

/// Print a selected committee
pub async fn handle_signers(api_url: &str, count: usize) -> CmdResult {
    let body = get_json(&format!("{}/signers/{}", api_url, count)).await?;

    if let Some(code) = body["code"].as_str() {
        return Err(format!(
            "{}: {}",
            code,
            body["error"].as_str().unwrap_or("selection failed")
        )
        .into());
    }

    let signers = body["signers"].as_array().cloned().unwrap_or_default();
    println!("Selected {} signer(s)", signers.len());
    for node in signers {
        print_node(&node);
    }
    Ok(())
}

// Helper functions

async fn get_json(url: &str) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await?
        .json::<Value>()
        .await?;
    Ok(response)
}

fn print_node(node: &Value) {
    println!(
        "  {} [{}] api={} gossip={} heartbeats={}",
        node["nodeId"].as_str().unwrap_or("?"),
        node["status"].as_str().unwrap_or("?"),
        node["apiEndpoint"].as_str().unwrap_or("?"),
        node["gossipEndpoint"].as_str().unwrap_or("?"),
        node["heartbeatCount"]
    );
}
