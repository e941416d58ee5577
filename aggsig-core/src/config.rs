//! Node Configuration
//!
//! Configuration for a signer node: identity, advertised endpoints,
//! gossip timers, endpoint policy and signing parameters.
//! Supports loading from environment variables with the `AGGSIG_` prefix.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;
use crate::error::{ConfigError, ConfigResult};
use crate::logging::LogConfig;

/// Gossip protocol timing and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Interval between discovery broadcasts
    pub gossip_interval_ms: u64,
    /// Interval between heartbeat / health-check rounds
    pub heartbeat_interval_ms: u64,
    /// Interval between reconnect rounds
    pub reconnect_interval_ms: u64,
    /// Silence before an active node is suspected
    pub suspicion_timeout_ms: u64,
    /// Silence before a suspected node becomes inactive
    pub cleanup_timeout_ms: u64,
    /// Per-probe timeout for health checks
    pub health_check_timeout_ms: u64,
    /// Connection establishment timeout
    pub connect_timeout_ms: u64,
    /// Attempts per bootstrap peer at startup
    pub max_connect_attempts: u32,
    /// Base retry delay (exponential backoff)
    pub reconnect_delay_ms: u64,
    /// Bounded de-duplication cache size
    pub max_message_history: usize,
    /// Hop budget for originated messages
    pub max_ttl: u8,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval_ms: DEFAULT_GOSSIP_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            suspicion_timeout_ms: DEFAULT_SUSPICION_TIMEOUT_MS,
            cleanup_timeout_ms: DEFAULT_CLEANUP_TIMEOUT_MS,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_message_history: DEFAULT_MAX_MESSAGE_HISTORY,
            max_ttl: DEFAULT_MAX_TTL,
        }
    }
}

impl GossipConfig {
    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Rules applied to peer URLs before any connection is attempted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// Accept loopback / private / link-local addresses
    pub allow_private_networks: bool,
    /// Accept `localhost` and `127.0.0.1` only (local clusters)
    pub development_mode: bool,
    /// Lowest explicit port accepted
    pub min_port: u16,
    /// Highest explicit port accepted
    pub max_port: u16,
    /// Domains accepted even if a rebinding heuristic matches
    pub allowed_domains: Vec<String>,
    /// Known dynamic-DNS / rebinding domains (suffix match)
    pub blocked_domains: Vec<String>,
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self {
            allow_private_networks: false,
            development_mode: false,
            min_port: DEFAULT_MIN_PORT,
            max_port: DEFAULT_MAX_PORT,
            allowed_domains: Vec::new(),
            blocked_domains: default_blocked_domains(),
        }
    }
}

fn default_blocked_domains() -> Vec<String> {
    [
        "nip.io",
        "xip.io",
        "sslip.io",
        "nip.direct",
        "localtest.me",
        "lvh.me",
        "vcap.me",
        "traefik.me",
        "1u.ms",
        "rbndr.us",
        "rebind.it",
        "rebind.network",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

/// Complete node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Stable node identifier (derived from the public key when absent)
    pub node_id: Option<String>,
    /// Bind host for the HTTP/WebSocket server
    pub host: String,
    /// Bind port for the HTTP/WebSocket server
    pub port: u16,
    /// API base URL advertised to peers
    pub public_api_endpoint: String,
    /// Gossip WebSocket URL advertised to peers
    pub public_gossip_endpoint: String,
    /// Deployment region advertised to peers
    pub region: String,
    /// Gossip endpoints dialled at startup
    pub bootstrap_peers: Vec<String>,
    /// Gossip timers and limits
    pub gossip: GossipConfig,
    /// Peer URL policy
    pub endpoint_policy: EndpointPolicy,
    /// Hash-to-curve domain separation tag
    pub dst: String,
    /// On-chain aggregate verifier address
    pub validator_contract_address: String,
    /// Where the signer identity is persisted
    pub identity_path: PathBuf,
    /// Enable permissive CORS on the API
    pub enable_cors: bool,
    /// Logging configuration
    pub log: LogConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_api_endpoint: "http://localhost:3001".to_string(),
            public_gossip_endpoint: "ws://localhost:3001/gossip".to_string(),
            region: "default".to_string(),
            bootstrap_peers: Vec::new(),
            gossip: GossipConfig::default(),
            endpoint_policy: EndpointPolicy::default(),
            dst: DEFAULT_DST.to_string(),
            validator_contract_address: String::new(),
            identity_path: PathBuf::from("aggsig-identity.json"),
            enable_cors: true,
            log: LogConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their default value. List values are comma
    /// separated. Boolean values accept `true/false/1/0/yes/no`. A value that
    /// is set but does not parse is an error, never a silent default.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.log = LogConfig::from_env();
        Ok(config)
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvSource(lookup);
        let mut config = Self::default();

        config.node_id = vars.get("AGGSIG_NODE_ID").filter(|s| !s.is_empty());
        if let Some(host) = vars.get("AGGSIG_HOST") {
            config.host = host;
        }
        config.port = vars.parse("AGGSIG_PORT", config.port)?;
        if let Some(url) = vars.get("AGGSIG_PUBLIC_API_ENDPOINT") {
            config.public_api_endpoint = url;
        }
        if let Some(url) = vars.get("AGGSIG_PUBLIC_GOSSIP_ENDPOINT") {
            config.public_gossip_endpoint = url;
        }
        if let Some(region) = vars.get("AGGSIG_REGION") {
            config.region = region;
        }
        if let Some(peers) = vars.list("AGGSIG_BOOTSTRAP_PEERS") {
            config.bootstrap_peers = peers;
        }

        let gossip = &mut config.gossip;
        gossip.gossip_interval_ms = vars.parse("AGGSIG_GOSSIP_INTERVAL_MS", gossip.gossip_interval_ms)?;
        gossip.heartbeat_interval_ms =
            vars.parse("AGGSIG_HEARTBEAT_INTERVAL_MS", gossip.heartbeat_interval_ms)?;
        gossip.reconnect_interval_ms =
            vars.parse("AGGSIG_RECONNECT_INTERVAL_MS", gossip.reconnect_interval_ms)?;
        gossip.suspicion_timeout_ms =
            vars.parse("AGGSIG_SUSPICION_TIMEOUT_MS", gossip.suspicion_timeout_ms)?;
        gossip.cleanup_timeout_ms = vars.parse("AGGSIG_CLEANUP_TIMEOUT_MS", gossip.cleanup_timeout_ms)?;
        gossip.health_check_timeout_ms =
            vars.parse("AGGSIG_HEALTH_CHECK_TIMEOUT_MS", gossip.health_check_timeout_ms)?;
        gossip.max_message_history =
            vars.parse("AGGSIG_MAX_MESSAGE_HISTORY", gossip.max_message_history)?;
        gossip.max_ttl = vars.parse("AGGSIG_MAX_TTL", gossip.max_ttl)?;

        let policy = &mut config.endpoint_policy;
        policy.allow_private_networks =
            vars.flag("AGGSIG_ALLOW_PRIVATE_NETWORKS", policy.allow_private_networks)?;
        policy.development_mode = vars.flag("AGGSIG_DEVELOPMENT_MODE", policy.development_mode)?;
        policy.min_port = vars.parse("AGGSIG_MIN_PORT", policy.min_port)?;
        policy.max_port = vars.parse("AGGSIG_MAX_PORT", policy.max_port)?;
        if let Some(domains) = vars.list("AGGSIG_ALLOWED_DOMAINS") {
            policy.allowed_domains = domains;
        }
        if let Some(domains) = vars.list("AGGSIG_BLOCKED_DOMAINS") {
            policy.blocked_domains = domains;
        }

        if let Some(dst) = vars.get("AGGSIG_DST") {
            config.dst = dst;
        }
        if let Some(address) = vars.get("AGGSIG_VALIDATOR_CONTRACT_ADDRESS") {
            config.validator_contract_address = address;
        }
        if let Some(path) = vars.get("AGGSIG_IDENTITY_PATH") {
            config.identity_path = PathBuf::from(path);
        }
        config.enable_cors = vars.flag("AGGSIG_ENABLE_CORS", config.enable_cors)?;

        Ok(config)
    }

    /// Check the configuration before the node starts.
    ///
    /// These are the only errors allowed to stop the process.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_contract_address(&self.validator_contract_address)?;
        validate_dst(&self.dst)?;

        if self.gossip.suspicion_timeout_ms >= self.gossip.cleanup_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "suspicion timeout ({}ms) must be shorter than cleanup timeout ({}ms)",
                self.gossip.suspicion_timeout_ms, self.gossip.cleanup_timeout_ms
            )));
        }
        if self.gossip.max_ttl == 0 || self.gossip.max_ttl > MAX_ALLOWED_TTL {
            return Err(ConfigError::Invalid(format!(
                "max TTL must be between 1 and {}, got {}",
                MAX_ALLOWED_TTL, self.gossip.max_ttl
            )));
        }
        if self.gossip.max_message_history == 0 {
            return Err(ConfigError::Invalid(
                "max message history must be at least 1".to_string(),
            ));
        }
        if self.endpoint_policy.min_port > self.endpoint_policy.max_port {
            return Err(ConfigError::Invalid(format!(
                "port range is empty: {}..={}",
                self.endpoint_policy.min_port, self.endpoint_policy.max_port
            )));
        }
        Ok(())
    }
}

/// Validate an EVM contract address (`0x` + 40 hex characters)
pub fn validate_contract_address(address: &str) -> ConfigResult<()> {
    if address.is_empty() {
        return Err(ConfigError::Missing("AGGSIG_VALIDATOR_CONTRACT_ADDRESS".to_string()));
    }
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| ConfigError::InvalidContractAddress(address.to_string()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidContractAddress(address.to_string()));
    }
    Ok(())
}

/// Validate a hash-to-curve domain separation tag
pub fn validate_dst(dst: &str) -> ConfigResult<()> {
    if dst.is_empty() {
        return Err(ConfigError::InvalidDst("DST must not be empty".to_string()));
    }
    if dst.len() > MAX_DST_LEN {
        return Err(ConfigError::InvalidDst(format!(
            "DST exceeds {} bytes: {}",
            MAX_DST_LEN,
            dst.len()
        )));
    }
    if !dst.is_ascii() {
        return Err(ConfigError::InvalidDst("DST must be ASCII".to_string()));
    }
    Ok(())
}

/// Typed access to a key/value configuration source
struct EnvSource<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e| {
                ConfigError::Invalid(format!("{}={:?}: {}", key, raw, e))
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.get(key).map(|s| s.trim().to_lowercase()) {
            None => Ok(default),
            Some(v) if v == "true" || v == "1" || v == "yes" => Ok(true),
            Some(v) if v == "false" || v == "0" || v == "no" => Ok(false),
            Some(v) => Err(ConfigError::Invalid(format!(
                "{}={:?}: expected true/false",
                key, v
            ))),
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> NodeConfig {
        NodeConfig {
            validator_contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_default_config_needs_contract_address() {
        let config = NodeConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_contract_address() {
        assert!(validate_contract_address("5FbDB2315678afecb367f032d93F642f64180aa3").is_err());
        assert!(validate_contract_address("0x1234").is_err());
        assert!(validate_contract_address("0xZZbDB2315678afecb367f032d93F642f64180aa3").is_err());
    }

    #[test]
    fn test_invalid_dst() {
        assert!(validate_dst("").is_err());
        assert!(validate_dst(&"A".repeat(256)).is_err());
        assert!(validate_dst("BLS_SIG_é").is_err());
        assert!(validate_dst(DEFAULT_DST).is_ok());
    }

    #[test]
    fn test_timeout_ordering() {
        let mut config = valid_config();
        config.gossip.suspicion_timeout_ms = 10_000;
        config.gossip.cleanup_timeout_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        let mut config = valid_config();
        config.gossip.max_ttl = 0;
        assert!(config.validate().is_err());
        config.gossip.max_ttl = MAX_ALLOWED_TTL + 1;
        assert!(config.validate().is_err());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_values() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("AGGSIG_PORT", "4100"),
            ("AGGSIG_MAX_TTL", "5"),
            ("AGGSIG_DEVELOPMENT_MODE", "yes"),
            ("AGGSIG_BOOTSTRAP_PEERS", "wss://a.example.com, ,wss://b.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.gossip.max_ttl, 5);
        assert!(config.endpoint_policy.development_mode);
        assert_eq!(config.bootstrap_peers.len(), 2);
        assert_eq!(config.host, NodeConfig::default().host);
    }

    #[test]
    fn test_malformed_values_rejected() {
        for (key, value) in [
            ("AGGSIG_PORT", "abc"),
            ("AGGSIG_MAX_TTL", "300"),
            ("AGGSIG_SUSPICION_TIMEOUT_MS", "-5"),
            ("AGGSIG_ENABLE_CORS", "maybe"),
        ] {
            let result = NodeConfig::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid(ref msg)) if msg.contains(key)),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_default_blocklist_contains_rebinding_domains() {
        let policy = EndpointPolicy::default();
        assert!(policy.blocked_domains.iter().any(|d| d == "nip.io"));
        assert!(policy.blocked_domains.iter().any(|d| d == "sslip.io"));
    }
}
