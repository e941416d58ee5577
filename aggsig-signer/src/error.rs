//! Error types for the BLS engine

use thiserror::Error;

/// Signer errors
#[derive(Error, Debug)]
pub enum SignerError {
    /// Malformed hex or byte layout
    #[error("Decode error: {0}")]
    Decode(String),

    /// Point not on the curve or outside the prime-order subgroup
    #[error("Invalid point: {0}")]
    InvalidPoint(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    /// Aggregated signature failed the pairing check
    #[error("Aggregate signature verification failed")]
    AggregateVerificationFailed,

    #[error("Identity storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;
