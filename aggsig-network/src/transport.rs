//! Gossip Transport
//!
//! A connection is a pair of channels carrying decoded [`GossipMessage`]s.
//! The gossip protocol never touches sockets directly:
//!
//! - [`WsConnector`] dials peers over WebSocket (tokio-tungstenite) and
//!   pumps frames through a reader and a writer task
//! - The API server bridges accepted `/gossip` upgrades into the same shape
//! - [`MemoryConnector`] wires nodes together in-process for tests
//!
//! Dropping the outbound sender closes the socket; the inbound receiver
//! yields `None` once the remote side goes away.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use aggsig_core::CONNECTION_QUEUE_SIZE;

use crate::error::{NetworkError, NetworkResult};
use crate::message::GossipMessage;

/// Per-connection state, independent of the peer's directory status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Channel pair for one peer connection
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::Sender<GossipMessage>,
    pub inbound: mpsc::Receiver<GossipMessage>,
}

impl Connection {
    /// Two connected ends: what one sends, the other receives
    pub fn pair(capacity: usize) -> (Connection, Connection) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (
            Connection {
                outbound: a_tx,
                inbound: b_rx,
            },
            Connection {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }
}

/// Decode one text frame. Malformed frames are logged and skipped.
pub fn parse_frame(text: &str, peer: &str) -> Option<GossipMessage> {
    match GossipMessage::from_json(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(peer = %peer, error = %e, "Dropping malformed gossip frame");
            None
        }
    }
}

/// Dials gossip endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to an already validated endpoint
    async fn connect(&self, endpoint: &str) -> NetworkResult<Connection>;
}

/// WebSocket connector
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> NetworkResult<Connection> {
        let (ws_stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| NetworkError::Connection(format!("{}: {}", endpoint, e)))?;

        let (mut sink, mut stream) = ws_stream.split();
        let (local, remote) = Connection::pair(CONNECTION_QUEUE_SIZE);
        let Connection {
            outbound: inbound_tx,
            inbound: mut outbound_rx,
        } = remote;

        // Writer: outbound messages -> text frames
        let peer = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Failed to encode gossip message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(peer = %peer, error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: text frames -> inbound messages
        let peer = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(message) = parse_frame(&text, &peer) {
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(local)
    }
}

/// In-process connector for tests
#[derive(Clone, Default)]
pub struct MemoryConnector {
    listeners: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Connection>>>>,
    attempts: Arc<RwLock<HashMap<String, u32>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept connections dialled to `endpoint`
    pub async fn listen(&self, endpoint: &str) -> mpsc::UnboundedReceiver<Connection> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().await.insert(endpoint.to_string(), tx);
        rx
    }

    /// Stop accepting connections for `endpoint`
    pub async fn unlisten(&self, endpoint: &str) {
        self.listeners.write().await.remove(endpoint);
    }

    /// Number of dial attempts made to `endpoint`
    pub async fn attempts(&self, endpoint: &str) -> u32 {
        self.attempts.read().await.get(endpoint).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &str) -> NetworkResult<Connection> {
        *self
            .attempts
            .write()
            .await
            .entry(endpoint.to_string())
            .or_insert(0) += 1;

        let listeners = self.listeners.read().await;
        let listener = listeners
            .get(endpoint)
            .ok_or_else(|| NetworkError::Connection(format!("{}: connection refused", endpoint)))?;

        let (local, remote) = Connection::pair(CONNECTION_QUEUE_SIZE);
        listener
            .send(remote)
            .map_err(|_| NetworkError::Connection(format!("{}: listener closed", endpoint)))?;
        Ok(local)
    }
}
