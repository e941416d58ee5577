//! Gossip Protocol
//!
//! Decentralized discovery and failure detection for signer nodes.
//!
//! - Bootstrap: dial configured peers in parallel with bounded retries,
//!   then announce ourselves with `join`
//! - Dispatch: de-duplicate by message id, apply the payload to the
//!   peer directory, relay with `ttl - 1` to every other connection
//! - Timers: heartbeat/health-check, periodic discovery, reconnect
//! - Teardown: `leave`, cancel timers, close connections (idempotent)
//!
//! Each connection has its own reader task, so messages from one peer are
//! handled strictly in arrival order.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use aggsig_core::{GossipConfig, MAX_RECONNECT_DELAY_MS};

use crate::directory::{PeerDirectory, PeerStatus};
use crate::endpoint::EndpointValidator;
use crate::error::{NetworkError, NetworkResult};
use crate::history::MessageHistory;
use crate::message::{
    GossipData, GossipMessage, GossipPayload, HeartbeatData, JoinData, LeaveData, NodeId,
    PeerDiscoveryData, PeerInfo,
};
use crate::probe::HealthProbe;
use crate::stats::{GossipStats, NetworkHealth};
use crate::transport::{Connection, ConnectionState, Connector};

/// Capacity of the application pub/sub channel
const EVENT_CHANNEL_SIZE: usize = 256;

/// Connection identifier, local to this node
pub type ConnectionId = u64;

/// Application payload delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct GossipEvent {
    pub from: NodeId,
    pub topic: String,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

struct ConnectionHandle {
    /// Dialled endpoint (outbound connections only)
    endpoint: Option<String>,
    /// Node id learned from the peer's discovery request
    remote_node: Option<NodeId>,
    outbound: mpsc::Sender<GossipMessage>,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// Key recorded in the message history's propagation set
    fn peer_key(&self, id: ConnectionId) -> String {
        match (&self.endpoint, &self.remote_node) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(node_id)) => format!("node:{}", node_id),
            (None, None) => format!("conn:{}", id),
        }
    }
}

/// Gossip protocol instance for one node
pub struct GossipProtocol {
    config: GossipConfig,
    self_info: PeerInfo,
    /// Sanitized form of our own gossip endpoint
    self_gossip_endpoint: String,
    bootstrap_peers: Vec<String>,
    validator: EndpointValidator,
    connector: Arc<dyn Connector>,
    probe: Arc<dyn HealthProbe>,
    directory: Arc<RwLock<PeerDirectory>>,
    history: Mutex<MessageHistory>,
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    states: RwLock<HashMap<String, ConnectionState>>,
    next_connection_id: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    gossip_rounds: AtomicU64,
    last_gossip_time: RwLock<Option<DateTime<Utc>>>,
    events: broadcast::Sender<GossipEvent>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl GossipProtocol {
    pub fn new(
        config: GossipConfig,
        self_info: PeerInfo,
        bootstrap_peers: Vec<String>,
        validator: EndpointValidator,
        connector: Arc<dyn Connector>,
        probe: Arc<dyn HealthProbe>,
    ) -> Arc<Self> {
        let self_gossip_endpoint = validator
            .validate_default(&self_info.gossip_endpoint)
            .unwrap_or_else(|_| self_info.gossip_endpoint.clone());
        let directory = PeerDirectory::new(config.suspicion_timeout_ms, config.cleanup_timeout_ms);
        let history = MessageHistory::new(config.max_message_history);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Arc::new(Self {
            config,
            self_info,
            self_gossip_endpoint,
            bootstrap_peers,
            validator,
            connector,
            probe,
            directory: Arc::new(RwLock::new(directory)),
            history: Mutex::new(history),
            connections: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            gossip_rounds: AtomicU64::new(0),
            last_gossip_time: RwLock::new(None),
            events,
            timers: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.self_info.node_id
    }

    pub fn self_info(&self) -> &PeerInfo {
        &self.self_info
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Shared directory handle (read by the selector and the API)
    pub fn directory(&self) -> Arc<RwLock<PeerDirectory>> {
        self.directory.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect to bootstrap peers, announce ourselves and start the timers.
    ///
    /// Fails only if bootstrap peers are configured and none of them could
    /// be reached after all retries.
    pub async fn start(self: &Arc<Self>) -> NetworkResult<()> {
        if self.is_shut_down() {
            return Err(NetworkError::ShutDown);
        }

        if self.bootstrap_peers.is_empty() {
            info!(node_id = %self.node_id(), "No bootstrap peers configured, starting as seed node");
        } else {
            let attempts = join_all(self.bootstrap_peers.iter().map(|endpoint| {
                let this = self.clone();
                let endpoint = endpoint.clone();
                async move { this.connect_with_retry(&endpoint).await }
            }))
            .await;

            let connected = attempts.iter().filter(|r| r.is_ok()).count();
            info!(
                connected,
                configured = self.bootstrap_peers.len(),
                "Bootstrap complete"
            );
            if connected == 0 {
                return Err(NetworkError::NoBootstrapReachable {
                    attempts: self.config.max_connect_attempts,
                });
            }
        }

        self.broadcast(GossipPayload::Join(JoinData {
            peer: self.self_info.clone(),
        }))
        .await?;

        self.spawn_timers().await;
        Ok(())
    }

    /// Send `leave`, cancel timers and close every connection.
    ///
    /// Safe to call any number of times.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        let leave = self.originate(GossipPayload::Leave(LeaveData {
            node_id: self.self_info.node_id.clone(),
        }))
        .await;
        self.send_to_all(&leave, None).await;

        for timer in self.timers.lock().await.drain(..) {
            timer.abort();
        }

        let handles: Vec<ConnectionHandle> = self
            .connections
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let closed = handles.len();
        for handle in handles {
            if let Some(reader) = handle.reader {
                reader.abort();
            }
        }
        self.states.write().await.clear();

        info!(node_id = %self.node_id(), closed, "Gossip protocol shut down");
    }

    async fn spawn_timers(self: &Arc<Self>) {
        let mut timers = self.timers.lock().await;

        let this = self.clone();
        timers.push(tokio::spawn(async move {
            let mut ticker = interval(this.config.heartbeat_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.is_shut_down() {
                    break;
                }
                this.heartbeat_round().await;
            }
        }));

        let this = self.clone();
        timers.push(tokio::spawn(async move {
            let mut ticker = interval(this.config.gossip_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.is_shut_down() {
                    break;
                }
                this.discovery_round().await;
            }
        }));

        let this = self.clone();
        timers.push(tokio::spawn(async move {
            let mut ticker = interval(this.config.reconnect_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.is_shut_down() {
                    break;
                }
                this.reconnect_round().await;
            }
        }));
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Validate and dial a gossip endpoint, then ask it for its peers
    pub async fn connect_to(self: &Arc<Self>, endpoint: &str) -> NetworkResult<()> {
        if self.is_shut_down() {
            return Err(NetworkError::ShutDown);
        }

        let endpoint = self.validator.validate_default(endpoint)?;
        if endpoint == self.self_gossip_endpoint {
            return Err(NetworkError::invalid_endpoint(&endpoint, "own gossip endpoint"));
        }

        {
            let mut states = self.states.write().await;
            match states.get(&endpoint) {
                Some(ConnectionState::Connected) | Some(ConnectionState::Connecting) => {
                    return Ok(());
                }
                _ => {
                    states.insert(endpoint.clone(), ConnectionState::Connecting);
                }
            }
        }

        let connection = match timeout(
            self.config.connect_timeout(),
            self.connector.connect(&endpoint),
        )
        .await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                self.set_state(&endpoint, ConnectionState::Disconnected).await;
                return Err(e);
            }
            Err(_) => {
                self.set_state(&endpoint, ConnectionState::Disconnected).await;
                return Err(NetworkError::Timeout(format!("connect to {}", endpoint)));
            }
        };

        let id = self.register(Some(endpoint.clone()), connection).await;
        self.set_state(&endpoint, ConnectionState::Connected).await;
        info!(endpoint = %endpoint, connection = id, "Connected to peer");

        let request = self.discovery_request();
        self.send_to(id, &request).await;
        Ok(())
    }

    /// Dial with exponential backoff, up to `max_connect_attempts` times
    pub async fn connect_with_retry(self: &Arc<Self>, endpoint: &str) -> NetworkResult<()> {
        let attempts = self.config.max_connect_attempts.max(1);
        let mut delay = self.config.reconnect_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.connect_to(endpoint).await {
                Ok(()) => return Ok(()),
                Err(e @ NetworkError::InvalidEndpoint { .. }) => {
                    warn!(endpoint = %endpoint, error = %e, "Skipping invalid bootstrap endpoint");
                    return Err(e);
                }
                Err(e) if attempt >= attempts => {
                    warn!(endpoint = %endpoint, attempts = attempt, error = %e, "Giving up on peer");
                    return Err(e);
                }
                Err(e) => {
                    debug!(endpoint = %endpoint, attempt, error = %e, "Connect failed, retrying");
                }
            }

            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY_MS);
        }
    }

    /// Adopt a connection a peer opened to us (e.g. `/gossip` upgrade)
    pub async fn accept(self: &Arc<Self>, connection: Connection) -> NetworkResult<ConnectionId> {
        if self.is_shut_down() {
            return Err(NetworkError::ShutDown);
        }
        let id = self.register(None, connection).await;
        info!(connection = id, "Accepted inbound gossip connection");
        Ok(id)
    }

    async fn register(self: &Arc<Self>, endpoint: Option<String>, connection: Connection) -> ConnectionId {
        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let Connection { outbound, inbound } = connection;

        self.connections.write().await.insert(
            id,
            ConnectionHandle {
                endpoint,
                remote_node: None,
                outbound,
                reader: None,
            },
        );

        let this = self.clone();
        let reader = tokio::spawn(async move { this.run_connection(id, inbound).await });
        if let Some(handle) = self.connections.write().await.get_mut(&id) {
            handle.reader = Some(reader);
        }
        id
    }

    async fn run_connection(self: Arc<Self>, id: ConnectionId, mut inbound: mpsc::Receiver<GossipMessage>) {
        while let Some(message) = inbound.recv().await {
            if self.is_shut_down() {
                return;
            }
            self.handle_message(id, message).await;
        }
        self.on_disconnect(id).await;
    }

    /// Connection closed by the remote side or by an error.
    ///
    /// Nodes behind it become suspected, never inactive: a partition should
    /// not blacklist anyone.
    async fn on_disconnect(&self, id: ConnectionId) {
        let Some(handle) = self.connections.write().await.remove(&id) else {
            return;
        };
        if self.is_shut_down() {
            return;
        }

        let mut directory = self.directory.write().await;
        if let Some(endpoint) = &handle.endpoint {
            self.states
                .write()
                .await
                .insert(endpoint.clone(), ConnectionState::Disconnected);
            let suspected = directory.mark_suspected_by_endpoint(endpoint);
            info!(endpoint = %endpoint, suspected = suspected.len(), "Disconnected from peer");
        } else if let Some(node_id) = &handle.remote_node {
            directory.mark_suspected(node_id);
            info!(node_id = %node_id, "Inbound gossip connection closed");
        } else {
            debug!(connection = id, "Anonymous inbound connection closed");
        }
    }

    async fn set_state(&self, endpoint: &str, state: ConnectionState) {
        self.states.write().await.insert(endpoint.to_string(), state);
    }

    /// Current state of the connection to `endpoint`
    pub async fn connection_state(&self, endpoint: &str) -> ConnectionState {
        let key = self
            .validator
            .validate_default(endpoint)
            .unwrap_or_else(|_| endpoint.to_string());
        self.states
            .read()
            .await
            .get(&key)
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Number of open connections (inbound and outbound)
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Endpoints of open outbound connections
    pub async fn connected_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .connections
            .read()
            .await
            .values()
            .filter_map(|h| h.endpoint.clone())
            .collect();
        endpoints.sort();
        endpoints
    }

    // =========================================================================
    // Message handling
    // =========================================================================

    /// Process one message that arrived on connection `from_connection`
    pub async fn handle_message(&self, from_connection: ConnectionId, mut message: GossipMessage) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        // A peer cannot extend the flood beyond our own hop limit
        message.ttl = message.ttl.min(self.config.max_ttl);

        if !self
            .history
            .lock()
            .await
            .insert(&message.message_id, Utc::now())
        {
            debug!(message_id = %message.message_id, "Duplicate message ignored");
            return;
        }

        if message.from == self.self_info.node_id {
            return;
        }

        debug!(
            message_id = %message.message_id,
            message_type = message.message_type(),
            from = %message.from,
            ttl = message.ttl,
            "Handling gossip message"
        );

        match &message.payload {
            GossipPayload::PeerDiscovery(data) => {
                self.handle_discovery(from_connection, &message.from, data).await;
            }
            GossipPayload::Heartbeat(data) => {
                self.directory
                    .write()
                    .await
                    .record_heartbeat(&data.node_id, Utc::now());
            }
            GossipPayload::Join(data) => {
                self.upsert_peers(std::slice::from_ref(&data.peer)).await;
            }
            GossipPayload::Leave(data) => {
                if data.node_id != self.self_info.node_id {
                    self.directory.write().await.mark_inactive(&data.node_id);
                }
            }
            GossipPayload::Gossip(data) => {
                // No subscribers is fine
                let _ = self.events.send(GossipEvent {
                    from: message.from.clone(),
                    topic: data.topic.clone(),
                    content: data.content.clone(),
                    timestamp: message.timestamp,
                });
            }
        }

        if let Some(relayed) = message.relayed() {
            self.relay(from_connection, relayed).await;
        }
    }

    async fn handle_discovery(&self, connection: ConnectionId, from: &str, data: &PeerDiscoveryData) {
        self.upsert_peers(&data.peers).await;

        if !data.request {
            return;
        }

        if let Some(handle) = self.connections.write().await.get_mut(&connection) {
            if handle.endpoint.is_none() && handle.remote_node.is_none() {
                handle.remote_node = Some(from.to_string());
            }
        }

        let now = Utc::now();
        let mut peers = vec![self.self_info.clone()];
        peers.extend(
            self.directory
                .read()
                .await
                .healthy(now)
                .into_iter()
                .filter(|n| n.node_id != from)
                .map(|n| n.to_info()),
        );

        let response = self
            .originate_with_ttl(
                GossipPayload::PeerDiscovery(PeerDiscoveryData {
                    request: false,
                    peers,
                }),
                0,
            )
            .await;
        self.send_to(connection, &response).await;
    }

    /// Upsert advertised peers, skipping ourselves and invalid endpoints
    async fn upsert_peers(&self, peers: &[PeerInfo]) {
        let now = Utc::now();
        let mut directory = self.directory.write().await;
        for peer in peers {
            if peer.node_id == self.self_info.node_id {
                continue;
            }
            let endpoint = match self.validator.validate_default(&peer.gossip_endpoint) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(node_id = %peer.node_id, error = %e, "Ignoring peer with invalid endpoint");
                    continue;
                }
            };
            if endpoint == self.self_gossip_endpoint {
                continue;
            }
            // Health checks and sign requests go to the API endpoint
            let api_endpoint = match self.validator.validate_api_default(&peer.api_endpoint) {
                Ok(api_endpoint) => api_endpoint,
                Err(e) => {
                    warn!(node_id = %peer.node_id, error = %e, "Ignoring peer with invalid API endpoint");
                    continue;
                }
            };
            let mut peer = peer.clone();
            peer.gossip_endpoint = endpoint;
            peer.api_endpoint = api_endpoint;
            directory.upsert(peer, now);
        }
    }

    /// Forward to every connection except the arrival one and peers that
    /// already got this message from us
    async fn relay(&self, from_connection: ConnectionId, message: GossipMessage) {
        let mut history = self.history.lock().await;
        let connections = self.connections.read().await;

        let mut relayed = 0;
        for (id, handle) in connections.iter() {
            if *id == from_connection {
                continue;
            }
            let key = handle.peer_key(*id);
            if history.was_propagated_to(&message.message_id, &key) {
                continue;
            }
            if Self::try_send(handle, &message) {
                history.record_propagation(&message.message_id, &key);
                relayed += 1;
            }
        }

        if relayed > 0 {
            self.messages_sent.fetch_add(relayed, Ordering::Relaxed);
            debug!(message_id = %message.message_id, relayed, ttl = message.ttl, "Relayed message");
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    fn discovery_request(&self) -> GossipMessage {
        GossipMessage::new(
            self.self_info.node_id.clone(),
            GossipPayload::PeerDiscovery(PeerDiscoveryData {
                request: true,
                peers: vec![self.self_info.clone()],
            }),
            0,
        )
    }

    /// New message from this node, recorded so echoes are dropped
    async fn originate(&self, payload: GossipPayload) -> GossipMessage {
        self.originate_with_ttl(payload, self.config.max_ttl).await
    }

    async fn originate_with_ttl(&self, payload: GossipPayload, ttl: u8) -> GossipMessage {
        let message = GossipMessage::new(self.self_info.node_id.clone(), payload, ttl);
        self.history
            .lock()
            .await
            .insert(&message.message_id, message.timestamp);
        message
    }

    /// Originate and send to every open connection
    pub async fn broadcast(&self, payload: GossipPayload) -> NetworkResult<usize> {
        if self.is_shut_down() {
            return Err(NetworkError::ShutDown);
        }
        let message = self.originate(payload).await;
        Ok(self.send_to_all(&message, None).await)
    }

    /// Publish an application payload on `topic`
    pub async fn publish(&self, topic: impl Into<String>, content: Value) -> NetworkResult<usize> {
        self.broadcast(GossipPayload::Gossip(GossipData {
            topic: topic.into(),
            content,
        }))
        .await
    }

    /// Receive application payloads published by other nodes
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.subscribe()
    }

    async fn send_to_all(&self, message: &GossipMessage, except: Option<ConnectionId>) -> usize {
        let mut history = self.history.lock().await;
        let connections = self.connections.read().await;

        let mut sent = 0;
        for (id, handle) in connections.iter() {
            if Some(*id) == except {
                continue;
            }
            if Self::try_send(handle, message) {
                history.record_propagation(&message.message_id, &handle.peer_key(*id));
                sent += 1;
            }
        }
        self.messages_sent.fetch_add(sent as u64, Ordering::Relaxed);
        sent
    }

    async fn send_to(&self, id: ConnectionId, message: &GossipMessage) -> bool {
        let connections = self.connections.read().await;
        let Some(handle) = connections.get(&id) else {
            return false;
        };
        let sent = Self::try_send(handle, message);
        if sent {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    // A full queue drops the message for that peer only; one slow peer
    // cannot stall the others.
    fn try_send(handle: &ConnectionHandle, message: &GossipMessage) -> bool {
        match handle.outbound.try_send(message.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    endpoint = ?handle.endpoint,
                    message_id = %message.message_id,
                    "Peer send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    // =========================================================================
    // Timer rounds
    // =========================================================================

    /// Announce our heartbeat, probe known nodes, then apply timeouts
    pub async fn heartbeat_round(&self) {
        if let Err(e) = self
            .broadcast(GossipPayload::Heartbeat(HeartbeatData {
                node_id: self.self_info.node_id.clone(),
            }))
            .await
        {
            debug!(error = %e, "Heartbeat broadcast skipped");
        }

        self.health_check_round().await;

        let report = self.directory.write().await.sweep(Utc::now());
        for node_id in &report.suspected {
            info!(node_id = %node_id, "Peer silent past suspicion timeout");
        }
        for node_id in &report.inactivated {
            info!(node_id = %node_id, "Peer silent past cleanup timeout");
        }
    }

    /// Probe active and suspected nodes concurrently with a per-probe timeout
    pub async fn health_check_round(&self) {
        let targets: Vec<(NodeId, String)> = self
            .directory
            .read()
            .await
            .all()
            .into_iter()
            .filter(|n| n.status != PeerStatus::Inactive)
            .map(|n| (n.node_id, n.api_endpoint))
            .collect();
        if targets.is_empty() {
            return;
        }

        let probe_timeout = self.config.health_check_timeout();
        let results = join_all(targets.into_iter().map(|(node_id, api)| {
            let probe = self.probe.clone();
            async move {
                let result = match timeout(probe_timeout, probe.probe(&api)).await {
                    Ok(result) => result,
                    Err(_) => Err(NetworkError::Timeout(format!("health check {}", api))),
                };
                (node_id, result)
            }
        }))
        .await;

        let now = Utc::now();
        let mut directory = self.directory.write().await;
        for (node_id, result) in results {
            match result {
                Ok(()) => {
                    directory.mark_alive(&node_id, now);
                }
                Err(e) => {
                    warn!(node_id = %node_id, error = %e, "Health check failed");
                    directory.mark_suspected(&node_id);
                }
            }
        }
    }

    /// Ask every neighbour for its peers
    pub async fn discovery_round(&self) {
        if self.is_shut_down() {
            return;
        }
        let request = self.discovery_request();
        let sent = self.send_to_all(&request, None).await;

        self.gossip_rounds.fetch_add(1, Ordering::Relaxed);
        *self.last_gossip_time.write().await = Some(Utc::now());
        debug!(sent, "Discovery round");
    }

    /// Re-dial bootstrap peers and active nodes we are not connected to in
    /// either direction
    pub async fn reconnect_round(self: &Arc<Self>) {
        let inbound: Vec<NodeId> = self
            .connections
            .read()
            .await
            .values()
            .filter(|h| h.endpoint.is_none())
            .filter_map(|h| h.remote_node.clone())
            .collect();

        let mut targets: Vec<String> = self.bootstrap_peers.clone();
        let mut inbound_endpoints: Vec<String> = Vec::new();
        for node in self.directory.read().await.all() {
            if inbound.contains(&node.node_id) {
                inbound_endpoints.push(node.gossip_endpoint);
            } else if node.status == PeerStatus::Active {
                targets.push(node.gossip_endpoint);
            }
        }

        let mut pending = Vec::new();
        {
            let states = self.states.read().await;
            for endpoint in targets {
                let Ok(sanitized) = self.validator.validate_default(&endpoint) else {
                    continue;
                };
                if sanitized == self.self_gossip_endpoint
                    || pending.contains(&sanitized)
                    || inbound_endpoints.contains(&sanitized)
                {
                    continue;
                }
                match states.get(&sanitized) {
                    Some(ConnectionState::Connected) | Some(ConnectionState::Connecting) => {}
                    _ => pending.push(sanitized),
                }
            }
        }
        if pending.is_empty() {
            return;
        }

        let results = join_all(pending.iter().map(|endpoint| {
            let this = self.clone();
            async move { this.connect_to(endpoint).await }
        }))
        .await;

        for (endpoint, result) in pending.iter().zip(results) {
            if let Err(e) = result {
                debug!(endpoint = %endpoint, error = %e, "Reconnect failed");
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn stats(&self) -> GossipStats {
        let counts = self.directory.read().await.counts();
        GossipStats {
            total_peers: counts.total(),
            active_peers: counts.active,
            suspected_peers: counts.suspected,
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            gossip_rounds: self.gossip_rounds.load(Ordering::Relaxed),
            last_gossip_time: *self.last_gossip_time.read().await,
        }
    }

    pub async fn health(&self) -> NetworkHealth {
        NetworkHealth::from_counts(&self.directory.read().await.counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryConnector;
    use aggsig_core::EndpointPolicy;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Probe whose answer is set per API endpoint
    #[derive(Default)]
    struct StubProbe {
        down: RwLock<HashSet<String>>,
        seen: RwLock<Vec<String>>,
    }

    #[async_trait]
    impl HealthProbe for StubProbe {
        async fn probe(&self, api_endpoint: &str) -> NetworkResult<()> {
            self.seen.write().await.push(api_endpoint.to_string());
            if self.down.read().await.contains(api_endpoint) {
                Err(NetworkError::Connection("down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn dev_validator() -> EndpointValidator {
        EndpointValidator::new(EndpointPolicy {
            development_mode: true,
            ..EndpointPolicy::default()
        })
    }

    fn test_config() -> GossipConfig {
        GossipConfig {
            max_connect_attempts: 2,
            reconnect_delay_ms: 10,
            connect_timeout_ms: 500,
            health_check_timeout_ms: 200,
            ..GossipConfig::default()
        }
    }

    fn peer_info(port: u16) -> PeerInfo {
        PeerInfo::new(
            format!("node-{}", port),
            format!("0x{:04x}", port),
            format!("http://localhost:{}", port),
            format!("ws://localhost:{}/gossip", port),
            "test",
        )
    }

    fn node(port: u16, bootstrap: Vec<String>, connector: &MemoryConnector) -> Arc<GossipProtocol> {
        GossipProtocol::new(
            test_config(),
            peer_info(port),
            bootstrap,
            dev_validator(),
            Arc::new(connector.clone()),
            Arc::new(StubProbe::default()),
        )
    }

    /// Route connections dialled to `port` into `node`
    async fn serve(connector: &MemoryConnector, port: u16, node: Arc<GossipProtocol>) {
        let mut listener = connector
            .listen(&format!("ws://localhost:{}/gossip", port))
            .await;
        tokio::spawn(async move {
            while let Some(connection) = listener.recv().await {
                let _ = node.accept(connection).await;
            }
        });
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_bootstrap_discovers_peer_both_ways() {
        let connector = MemoryConnector::new();
        let a = node(4001, vec![], &connector);
        serve(&connector, 4001, a.clone()).await;

        let b = node(4002, vec!["ws://localhost:4001/gossip".to_string()], &connector);
        b.start().await.unwrap();
        settle().await;

        // b learned a from the discovery response, a learned b from the request
        assert!(b.directory().read().await.contains("node-4001"));
        assert!(a.directory().read().await.contains("node-4002"));
        assert!(!b.directory().read().await.contains("node-4002"));
        assert_eq!(
            b.connection_state("ws://localhost:4001/gossip").await,
            ConnectionState::Connected
        );

        b.shutdown().await;
        a.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_bootstrap_reachable_is_fatal() {
        let connector = MemoryConnector::new();
        let b = node(4012, vec!["ws://localhost:4011/gossip".to_string()], &connector);

        let result = b.start().await;
        assert!(matches!(result, Err(NetworkError::NoBootstrapReachable { .. })));
        assert_eq!(connector.attempts("ws://localhost:4011/gossip").await, 2);
    }

    #[tokio::test]
    async fn test_invalid_bootstrap_endpoint_skipped() {
        let connector = MemoryConnector::new();
        let a = node(4021, vec![], &connector);
        serve(&connector, 4021, a.clone()).await;

        let b = node(
            4022,
            vec![
                "http://127.0.0.1:3000".to_string(),
                "ws://localhost:4021/gossip".to_string(),
            ],
            &connector,
        );
        b.start().await.unwrap();
        assert_eq!(connector.attempts("http://127.0.0.1:3000").await, 0);
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_message_processed_once() {
        let connector = MemoryConnector::new();
        let a = node(4031, vec![], &connector);
        a.directory().write().await.upsert(peer_info(4032), Utc::now());

        let heartbeat = GossipMessage::new(
            "node-4032",
            GossipPayload::Heartbeat(HeartbeatData {
                node_id: "node-4032".to_string(),
            }),
            0,
        );
        a.handle_message(99, heartbeat.clone()).await;
        a.handle_message(99, heartbeat).await;

        let dir = a.directory();
        let dir = dir.read().await;
        assert_eq!(dir.get("node-4032").unwrap().heartbeat_count, 1);
    }

    #[tokio::test]
    async fn test_relay_decrements_ttl_and_skips_origin() {
        let connector = MemoryConnector::new();
        let hub = node(4041, vec![], &connector);

        let (hub_side_1, mut peer_1) = Connection::pair(16);
        let (hub_side_2, mut peer_2) = Connection::pair(16);
        let conn_1 = hub.accept(hub_side_1).await.unwrap();
        hub.accept(hub_side_2).await.unwrap();

        let message = GossipMessage::new(
            "node-9999",
            GossipPayload::Leave(LeaveData {
                node_id: "node-9999".to_string(),
            }),
            2,
        );
        peer_1.outbound.send(message.clone()).await.unwrap();
        settle().await;

        let relayed = peer_2.inbound.try_recv().unwrap();
        assert_eq!(relayed.message_id, message.message_id);
        assert_eq!(relayed.ttl, 1);
        assert!(peer_1.inbound.try_recv().is_err());

        // Same message again from the other side: duplicate, not relayed
        hub.handle_message(conn_1 + 1, relayed).await;
        settle().await;
        assert!(peer_1.inbound.try_recv().is_err());

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_ttl_zero_not_relayed() {
        let connector = MemoryConnector::new();
        let hub = node(4051, vec![], &connector);
        hub.directory().write().await.upsert(peer_info(4052), Utc::now());

        let (hub_side_1, peer_1) = Connection::pair(16);
        let (hub_side_2, mut peer_2) = Connection::pair(16);
        hub.accept(hub_side_1).await.unwrap();
        hub.accept(hub_side_2).await.unwrap();

        let message = GossipMessage::new(
            "node-4052",
            GossipPayload::Heartbeat(HeartbeatData {
                node_id: "node-4052".to_string(),
            }),
            0,
        );
        peer_1.outbound.send(message).await.unwrap();
        settle().await;

        // Processed locally, never forwarded
        assert_eq!(
            hub.directory().read().await.get("node-4052").unwrap().heartbeat_count,
            1
        );
        assert!(peer_2.inbound.try_recv().is_err());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_leave_marks_inactive() {
        let connector = MemoryConnector::new();
        let a = node(4061, vec![], &connector);
        a.directory().write().await.upsert(peer_info(4062), Utc::now());

        let leave = GossipMessage::new(
            "node-4062",
            GossipPayload::Leave(LeaveData {
                node_id: "node-4062".to_string(),
            }),
            1,
        );
        a.handle_message(1, leave).await;
        assert_eq!(
            a.directory().read().await.get("node-4062").unwrap().status,
            PeerStatus::Inactive
        );
    }

    #[tokio::test]
    async fn test_join_excludes_self_and_invalid_endpoints() {
        let connector = MemoryConnector::new();
        let a = node(4071, vec![], &connector);

        let mut bad = peer_info(4073);
        bad.gossip_endpoint = "ws://169.254.169.254/".to_string();
        for peer in [peer_info(4071), bad, peer_info(4072)] {
            let join = GossipMessage::new("node-x", GossipPayload::Join(JoinData { peer }), 0);
            a.handle_message(1, join).await;
        }

        let dir = a.directory();
        let dir = dir.read().await;
        assert!(!dir.contains("node-4071"));
        assert!(!dir.contains("node-4073"));
        assert!(dir.contains("node-4072"));
    }

    #[tokio::test]
    async fn test_join_with_internal_api_endpoint_never_probed() {
        let connector = MemoryConnector::new();
        let probe = Arc::new(StubProbe::default());
        let a = GossipProtocol::new(
            test_config(),
            peer_info(4141),
            vec![],
            dev_validator(),
            Arc::new(connector),
            probe.clone(),
        );

        let mut metadata = peer_info(4142);
        metadata.api_endpoint = "http://169.254.169.254/latest/meta-data".to_string();
        for peer in [metadata, peer_info(4143)] {
            let join = GossipMessage::new("node-x", GossipPayload::Join(JoinData { peer }), 0);
            a.handle_message(1, join).await;
        }

        {
            let dir = a.directory();
            let dir = dir.read().await;
            assert!(!dir.contains("node-4142"));
            assert_eq!(
                dir.get("node-4143").unwrap().api_endpoint,
                "http://localhost:4143/"
            );
        }

        a.health_check_round().await;
        let seen = probe.seen.read().await;
        assert_eq!(*seen, vec!["http://localhost:4143/".to_string()]);
    }

    #[tokio::test]
    async fn test_inflated_ttl_clamped_before_relay() {
        let connector = MemoryConnector::new();
        let hub = node(4151, vec![], &connector);
        let max_ttl = hub.config().max_ttl;

        let (hub_side_1, peer_1) = Connection::pair(16);
        let (hub_side_2, mut peer_2) = Connection::pair(16);
        hub.accept(hub_side_1).await.unwrap();
        hub.accept(hub_side_2).await.unwrap();

        let message = GossipMessage::new(
            "node-9998",
            GossipPayload::Leave(LeaveData {
                node_id: "node-9998".to_string(),
            }),
            250,
        );
        peer_1.outbound.send(message).await.unwrap();
        settle().await;

        let relayed = peer_2.inbound.try_recv().unwrap();
        assert_eq!(relayed.ttl, max_ttl - 1);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_skips_peer_connected_inbound() {
        let connector = MemoryConnector::new();
        let a = node(4161, vec![], &connector);
        {
            let dir = a.directory();
            let mut dir = dir.write().await;
            dir.upsert(peer_info(4162), Utc::now());
            dir.upsert(peer_info(4163), Utc::now());
        }

        // node-4162 dialled us and introduced itself
        let (hub_side, mut remote) = Connection::pair(16);
        let id = a.accept(hub_side).await.unwrap();
        a.handle_message(
            id,
            GossipMessage::new(
                "node-4162",
                GossipPayload::PeerDiscovery(PeerDiscoveryData {
                    request: true,
                    peers: vec![peer_info(4162)],
                }),
                0,
            ),
        )
        .await;
        assert!(remote.inbound.recv().await.is_some());

        a.reconnect_round().await;

        assert_eq!(connector.attempts("ws://localhost:4162/gossip").await, 0);
        assert_eq!(connector.attempts("ws://localhost:4163/gossip").await, 1);
        a.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_suspects_endpoint() {
        let connector = MemoryConnector::new();
        let a = node(4081, vec![], &connector);
        serve(&connector, 4081, a.clone()).await;

        let b = node(4082, vec!["ws://localhost:4081/gossip".to_string()], &connector);
        b.start().await.unwrap();
        settle().await;
        assert_eq!(
            b.directory().read().await.get("node-4081").unwrap().status,
            PeerStatus::Active
        );

        a.shutdown().await;
        settle().await;

        let dir = b.directory();
        let dir = dir.read().await;
        // leave arrived first, otherwise the disconnect suspects it
        assert_ne!(dir.get("node-4081").unwrap().status, PeerStatus::Active);
        drop(dir);
        assert_eq!(
            b.connection_state("ws://localhost:4081/gossip").await,
            ConnectionState::Disconnected
        );
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_without_leave_suspects() {
        let connector = MemoryConnector::new();
        let a = node(4091, vec![], &connector);
        a.directory().write().await.upsert(peer_info(4092), Utc::now());

        let (hub_side, mut remote) = Connection::pair(16);
        let id = a.accept(hub_side).await.unwrap();
        a.handle_message(
            id,
            GossipMessage::new(
                "node-4092",
                GossipPayload::PeerDiscovery(PeerDiscoveryData {
                    request: true,
                    peers: vec![peer_info(4092)],
                }),
                0,
            ),
        )
        .await;
        assert!(remote.inbound.recv().await.is_some());

        drop(remote);
        settle().await;
        assert_eq!(
            a.directory().read().await.get("node-4092").unwrap().status,
            PeerStatus::Suspected
        );
    }

    #[tokio::test]
    async fn test_health_check_failure_suspects() {
        let connector = MemoryConnector::new();
        let probe = Arc::new(StubProbe::default());
        let a = GossipProtocol::new(
            test_config(),
            peer_info(4101),
            vec![],
            dev_validator(),
            Arc::new(connector),
            probe.clone(),
        );
        {
            let dir = a.directory();
            let mut dir = dir.write().await;
            dir.upsert(peer_info(4102), Utc::now());
            dir.upsert(peer_info(4103), Utc::now());
        }
        probe
            .down
            .write()
            .await
            .insert("http://localhost:4103".to_string());

        a.health_check_round().await;

        let dir = a.directory();
        let dir = dir.read().await;
        assert_eq!(dir.get("node-4102").unwrap().status, PeerStatus::Active);
        assert_eq!(dir.get("node-4103").unwrap().status, PeerStatus::Suspected);
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let connector = MemoryConnector::new();
        let a = node(4111, vec![], &connector);
        serve(&connector, 4111, a.clone()).await;
        let b = node(4112, vec!["ws://localhost:4111/gossip".to_string()], &connector);
        b.start().await.unwrap();
        settle().await;

        let mut events = a.subscribe();
        let sent = b
            .publish("registry", serde_json::json!({ "epoch": 3 }))
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.topic, "registry");
        assert_eq!(event.from, "node-4112");
        assert_eq!(event.content["epoch"], 3);

        b.shutdown().await;
        a.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let connector = MemoryConnector::new();
        let a = node(4121, vec![], &connector);
        a.start().await.unwrap();
        a.shutdown().await;
        a.shutdown().await;

        assert!(a.is_shut_down());
        assert_eq!(a.connection_count().await, 0);
        assert!(matches!(
            a.broadcast(GossipPayload::Heartbeat(HeartbeatData {
                node_id: "node-4121".to_string()
            }))
            .await,
            Err(NetworkError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let connector = MemoryConnector::new();
        let a = node(4131, vec![], &connector);
        assert_eq!(a.health().await, NetworkHealth::Isolated);

        a.directory().write().await.upsert(peer_info(4132), Utc::now());
        a.discovery_round().await;

        let stats = a.stats().await;
        assert_eq!(stats.total_peers, 1);
        assert_eq!(stats.active_peers, 1);
        assert_eq!(stats.gossip_rounds, 1);
        assert!(stats.last_gossip_time.is_some());
        assert_eq!(a.health().await, NetworkHealth::Healthy);
    }
}
