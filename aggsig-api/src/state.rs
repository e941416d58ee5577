//! Application state for the API server

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use aggsig_core::{NodeConfig, DEFAULT_SIGN_REQUEST_TIMEOUT_MS};
use aggsig_network::{
    Connector, EndpointValidator, GossipProtocol, HealthProbe, HttpHealthProbe, HttpSignClient,
    PeerInfo, SignClient, SignerSelector, SigningCoordinator, WsConnector,
};
use aggsig_signer::SignerIdentity;

use crate::error::ApiResult;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// This node's key material
    pub identity: Arc<RwLock<SignerIdentity>>,
    /// Gossip protocol (owns the peer directory)
    pub gossip: Arc<GossipProtocol>,
    /// Committee selection and signing rounds
    pub coordinator: Arc<SigningCoordinator>,
    /// Hash-to-curve domain separation tag
    pub dst: String,
    /// API version
    pub version: String,
}

impl AppState {
    /// Wire a node from configuration with the production transports
    pub fn from_config(config: &NodeConfig, identity: SignerIdentity) -> ApiResult<Self> {
        let validator = EndpointValidator::new(config.endpoint_policy.clone());
        let probe = HttpHealthProbe::new(config.gossip.health_check_timeout())?;
        let sign_client = HttpSignClient::new(
            validator,
            Duration::from_millis(DEFAULT_SIGN_REQUEST_TIMEOUT_MS),
        )?;

        Ok(Self::build(
            config,
            identity,
            Arc::new(WsConnector::new()),
            Arc::new(probe),
            Arc::new(sign_client),
        ))
    }

    /// Wire a node with explicit transports
    pub fn build(
        config: &NodeConfig,
        identity: SignerIdentity,
        connector: Arc<dyn Connector>,
        probe: Arc<dyn HealthProbe>,
        sign_client: Arc<dyn SignClient>,
    ) -> Self {
        let self_info = PeerInfo::new(
            identity.node_id(),
            identity.public_key_hex(),
            &config.public_api_endpoint,
            &config.public_gossip_endpoint,
            &config.region,
        );

        let gossip = GossipProtocol::new(
            config.gossip.clone(),
            self_info,
            config.bootstrap_peers.clone(),
            EndpointValidator::new(config.endpoint_policy.clone()),
            connector,
            probe,
        );

        let selector = Arc::new(Mutex::new(SignerSelector::new(
            config.gossip.suspicion_timeout_ms,
        )));
        let coordinator = Arc::new(SigningCoordinator::new(
            gossip.directory(),
            selector,
            sign_client,
            config.dst.clone(),
            Duration::from_millis(DEFAULT_SIGN_REQUEST_TIMEOUT_MS),
        ));

        Self {
            identity: Arc::new(RwLock::new(identity)),
            gossip,
            coordinator,
            dst: config.dst.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub async fn node_id(&self) -> String {
        self.identity.read().await.node_id().to_string()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            enable_cors: true,
        }
    }
}

impl From<&NodeConfig> for ApiConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
        }
    }
}
