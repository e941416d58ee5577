//! Configuration error types

use thiserror::Error;

/// Configuration errors. These are the only errors allowed to stop a node
/// at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid validator contract address: {0}")]
    InvalidContractAddress(String),

    #[error("Invalid domain separation tag: {0}")]
    InvalidDst(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
