//! Network Error Types

use aggsig_signer::SignerError;
use thiserror::Error;

/// Network errors
///
/// Everything here is recovered locally (skip the peer, mark it suspected,
/// reject the request) except `NoBootstrapReachable`, which stops startup.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Insufficient signers: needed {needed}, available {available}")]
    InsufficientSigners { needed: usize, available: usize },

    #[error("Aggregate signature verification failed (invalid signers: {invalid_signers:?})")]
    AggregateVerificationFailed { invalid_signers: Vec<String> },

    #[error("No bootstrap peer reachable after {attempts} attempts each")]
    NoBootstrapReachable { attempts: u32 },

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Gossip protocol is shut down")]
    ShutDown,
}

impl NetworkError {
    pub fn invalid_endpoint(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;
