//! Health and statistics endpoints

use axum::{extract::State, Json};
use chrono::Utc;

use aggsig_network::{GossipStats, NetworkHealth};

use crate::dto::HealthResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Health derived from the peer directory
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let counts = state.gossip.directory().read().await.counts();

    Ok(Json(HealthResponse {
        status: NetworkHealth::from_counts(&counts),
        node_id: state.node_id().await,
        version: state.version.clone(),
        active_peers: counts.active,
        suspected_peers: counts.suspected,
        timestamp: Utc::now(),
    }))
}

/// Gossip counters
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<GossipStats>> {
    Ok(Json(state.gossip.stats().await))
}
