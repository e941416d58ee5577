//! Gossip WebSocket endpoint
//!
//! Peers dial `GET /gossip`; the upgraded socket is bridged into a channel
//! [`Connection`] and handed to the gossip protocol like any outbound one.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use aggsig_core::CONNECTION_QUEUE_SIZE;
use aggsig_network::{parse_frame, Connection, GossipProtocol};

use crate::state::AppState;

/// Upgrade to a gossip connection
pub async fn gossip_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let gossip = state.gossip.clone();
    ws.on_upgrade(move |socket| bridge(gossip, socket))
}

async fn bridge(gossip: Arc<GossipProtocol>, socket: WebSocket) {
    let (local, remote) = Connection::pair(CONNECTION_QUEUE_SIZE);
    let connection_id = match gossip.accept(local).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Rejected inbound gossip connection");
            return;
        }
    };
    let Connection {
        outbound: inbound_tx,
        inbound: mut outbound_rx,
    } = remote;
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode gossip message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let peer = format!("inbound:{}", connection_id);
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
                debug!(peer = %peer, error = %e, "Gossip socket read failed");
                break;
            }
        }
    }

    // Dropping the sender ends the protocol's reader for this connection
    drop(inbound_tx);
    writer.abort();
    debug!(peer = %peer, "Gossip socket closed");
}
