//! Structured Logging
//!
//! Log conventions for aggsig nodes and the subscriber setup used by the
//! binary. Every crate logs through `tracing` with structured fields:
//!
//! - `node_id`: peer or local node identifier
//! - `endpoint`: gossip or API URL
//! - `message_id`: gossip message identifier
//! - `error`: error message
//! - `count`: item count
//!
//! ```ignore
//! use tracing::{info, warn};
//!
//! info!(endpoint = %url, "Connected to peer");
//! warn!(node_id = %id, error = %e, "Health check failed");
//! ```
//!
//! `RUST_LOG` takes precedence over the configured filter.

use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{ConfigError, ConfigResult};

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed for development
    #[default]
    Pretty,
    /// JSON for production
    Json,
    /// Compact single-line
    Compact,
}

impl LogFormat {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level applied to the aggsig crates
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Include source file/line
    pub include_source: bool,
    /// Explicit filter directive (e.g. "aggsig_network=debug,tower_http=warn")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_source: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Load from `AGGSIG_LOG_LEVEL`, `AGGSIG_LOG_FORMAT` and `AGGSIG_LOG_FILTER`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = env::var("AGGSIG_LOG_LEVEL").ok().and_then(|s| LogLevel::parse(&s)) {
            config.level = level;
        }
        if let Some(format) = env::var("AGGSIG_LOG_FORMAT")
            .ok()
            .and_then(|s| LogFormat::parse(&s))
        {
            config.format = format;
        }
        config.filter = env::var("AGGSIG_LOG_FILTER").ok().filter(|s| !s.is_empty());
        config
    }

    /// Default filter directive for all workspace crates
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!(
                "aggsig={level},aggsig_core={level},aggsig_signer={level},aggsig_network={level},aggsig_api={level},tower_http=warn",
                level = self.level
            ),
        }
    }
}

/// Initialize the global subscriber
pub fn init_logging(config: &LogConfig) -> ConfigResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive()))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            )
            .try_init(),
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
