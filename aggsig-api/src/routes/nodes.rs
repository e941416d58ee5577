//! Peer directory and committee selection endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::dto::{NodeListResponse, SignersResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Every known node, inactive ones included
pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<NodeListResponse>> {
    let nodes = state.gossip.directory().read().await.all();
    Ok(Json(NodeListResponse::new(nodes)))
}

/// Nodes currently eligible for signing
pub async fn list_active_nodes(State(state): State<AppState>) -> ApiResult<Json<NodeListResponse>> {
    let nodes = state.gossip.directory().read().await.healthy(Utc::now());
    Ok(Json(NodeListResponse::new(nodes)))
}

/// Select a signing committee
pub async fn select_signers(
    State(state): State<AppState>,
    Path(count): Path<usize>,
) -> ApiResult<Json<SignersResponse>> {
    if count == 0 {
        return Err(ApiError::Validation("count must be at least 1".to_string()));
    }

    let signers = state.coordinator.select_signers(count).await?;

    Ok(Json(SignersResponse { count, signers }))
}
