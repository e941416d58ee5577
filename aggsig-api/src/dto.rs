//! Data Transfer Objects for API requests and responses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aggsig_network::{NetworkHealth, PeerNode};
use aggsig_signer::{RegistrationStatus, SignatureResult};

pub use aggsig_network::SignRequest;

// ============ Node DTOs ============

/// Health response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// healthy, degraded or isolated
    pub status: NetworkHealth,
    pub node_id: String,
    pub version: String,
    pub active_peers: usize,
    pub suspected_peers: usize,
    pub timestamp: DateTime<Utc>,
}

/// Directory listing
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListResponse {
    pub nodes: Vec<PeerNode>,
    pub count: usize,
}

impl NodeListResponse {
    pub fn new(nodes: Vec<PeerNode>) -> Self {
        Self {
            count: nodes.len(),
            nodes,
        }
    }
}

/// Selected signing committee
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignersResponse {
    pub count: usize,
    pub signers: Vec<PeerNode>,
}

/// This node's identity
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub node_id: String,
    /// EIP-2537 G1 public key (hex)
    pub public_key: String,
    pub registration_status: RegistrationStatus,
    pub version: String,
}

// ============ Signing DTOs ============

/// Aggregate partial signatures request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub signatures: Vec<SignatureResult>,
    /// Hex-encoded message every partial signature covers
    pub message: String,
}

/// Verify an aggregate signature request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// EIP-2537 G2 signature (hex)
    pub signature: String,
    /// EIP-2537 G1 public keys (hex), aggregated before the check
    pub public_keys: Vec<String>,
    /// Hex-encoded message
    pub message: String,
}

/// Verification result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub message: String,
}

/// Run a full signing round request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSignRequest {
    /// Hex-encoded message (e.g. a user operation hash)
    pub message: String,
    /// Committee size
    pub count: usize,
}
