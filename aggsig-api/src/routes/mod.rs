//! API route handlers

pub mod gossip;
pub mod health;
pub mod nodes;
pub mod signing;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/stats", get(health::stats))
        // Directory endpoints
        .route("/nodes", get(nodes::list_nodes))
        .route("/nodes/active", get(nodes::list_active_nodes))
        .route("/signers/:count", get(nodes::select_signers))
        // Signing endpoints
        .route("/identity", get(signing::get_identity))
        .route("/sign", post(signing::sign))
        .route("/aggregate", post(signing::aggregate))
        .route("/verify", post(signing::verify))
        .route("/aggregate-sign", post(signing::aggregate_sign))
        // Gossip transport
        .route("/gossip", get(gossip::gossip_socket))
        // State
        .with_state(state)
}
