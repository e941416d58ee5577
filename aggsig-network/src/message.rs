//! Gossip Message Types
//!
//! JSON wire format exchanged over the gossip WebSocket:
//!
//! ```json
//! {
//!   "type": "heartbeat",
//!   "data": { "nodeId": "node-1a2b..." },
//!   "from": "node-1a2b...",
//!   "timestamp": 1718000000000,
//!   "ttl": 3,
//!   "messageId": "5f0c...",
//!   "version": "1.0.0"
//! }
//! ```
//!
//! Unknown `type` values fail to deserialize and are dropped by the
//! transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aggsig_core::{CAPABILITY_BLS_SIGNING, PROTOCOL_VERSION};

/// Node identifier
pub type NodeId = String;

/// Unique message identifier
pub type MessageId = String;

/// Advertised description of a signer node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub node_id: NodeId,
    /// EIP-2537 hex G1 public key
    pub public_key: String,
    /// HTTP base URL for signing requests
    pub api_endpoint: String,
    /// WebSocket URL for gossip traffic
    pub gossip_endpoint: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub version: String,
}

impl PeerInfo {
    pub fn new(
        node_id: impl Into<NodeId>,
        public_key: impl Into<String>,
        api_endpoint: impl Into<String>,
        gossip_endpoint: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            public_key: public_key.into(),
            api_endpoint: api_endpoint.into(),
            gossip_endpoint: gossip_endpoint.into(),
            region: region.into(),
            capabilities: vec![CAPABILITY_BLS_SIGNING.to_string()],
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn can_sign(&self) -> bool {
        self.capabilities.iter().any(|c| c == CAPABILITY_BLS_SIGNING)
    }
}

/// `peer_discovery` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerDiscoveryData {
    /// A request expects a response on the same connection
    pub request: bool,
    #[serde(default)]
    pub peers: Vec<PeerInfo>,
}

/// `heartbeat` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatData {
    pub node_id: NodeId,
}

/// `join` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinData {
    pub peer: PeerInfo,
}

/// `leave` payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveData {
    pub node_id: NodeId,
}

/// `gossip` payload (application pub/sub)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GossipData {
    pub topic: String,
    pub content: Value,
}

/// Message payload, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GossipPayload {
    PeerDiscovery(PeerDiscoveryData),
    Heartbeat(HeartbeatData),
    Join(JoinData),
    Leave(LeaveData),
    Gossip(GossipData),
}

impl GossipPayload {
    /// Wire name of the message type
    pub fn message_type(&self) -> &'static str {
        match self {
            GossipPayload::PeerDiscovery(_) => "peer_discovery",
            GossipPayload::Heartbeat(_) => "heartbeat",
            GossipPayload::Join(_) => "join",
            GossipPayload::Leave(_) => "leave",
            GossipPayload::Gossip(_) => "gossip",
        }
    }
}

/// Gossip message envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GossipMessage {
    #[serde(flatten)]
    pub payload: GossipPayload,
    /// Originating node
    pub from: NodeId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Remaining relay hops
    pub ttl: u8,
    pub message_id: MessageId,
    pub version: String,
}

impl GossipMessage {
    /// Create a new message
    pub fn new(from: impl Into<NodeId>, payload: GossipPayload, ttl: u8) -> Self {
        Self {
            payload,
            from: from.into(),
            timestamp: Utc::now(),
            ttl,
            message_id: generate_message_id(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Copy to forward one more hop, or `None` once the hop budget is spent
    pub fn relayed(&self) -> Option<Self> {
        if self.ttl == 0 {
            return None;
        }
        let mut next = self.clone();
        next.ttl -= 1;
        Some(next)
    }

    pub fn message_type(&self) -> &'static str {
        self.payload.message_type()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Generate a unique message ID
pub fn generate_message_id() -> MessageId {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer() -> PeerInfo {
        PeerInfo::new(
            "node-1",
            "0x00",
            "https://signer1.example.com",
            "wss://signer1.example.com/gossip",
            "eu-west",
        )
    }

    #[test]
    fn test_wire_shape() {
        let msg = GossipMessage::new(
            "node-1",
            GossipPayload::Heartbeat(HeartbeatData {
                node_id: "node-1".to_string(),
            }),
            3,
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert_eq!(value["data"]["nodeId"], "node-1");
        assert_eq!(value["from"], "node-1");
        assert_eq!(value["ttl"], 3);
        assert_eq!(value["version"], PROTOCOL_VERSION);
        assert!(value["timestamp"].is_i64());
        assert!(value["messageId"].is_string());
    }

    #[test]
    fn test_parse_peer_discovery() {
        let json = json!({
            "type": "peer_discovery",
            "data": { "request": true, "peers": [peer()] },
            "from": "node-1",
            "timestamp": 1718000000000i64,
            "ttl": 0,
            "messageId": "abc",
            "version": "1.0.0"
        });
        let msg: GossipMessage = serde_json::from_value(json).unwrap();
        match &msg.payload {
            GossipPayload::PeerDiscovery(data) => {
                assert!(data.request);
                assert_eq!(data.peers.len(), 1);
                assert!(data.peers[0].can_sign());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(msg.timestamp.timestamp_millis(), 1718000000000);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type":"shutdown","data":{},"from":"x","timestamp":0,"ttl":1,"messageId":"m","version":"1.0.0"}"#;
        assert!(GossipMessage::from_json(json).is_err());
    }

    #[test]
    fn test_mismatched_payload_rejected() {
        let json = r#"{"type":"leave","data":{"topic":"t"},"from":"x","timestamp":0,"ttl":1,"messageId":"m","version":"1.0.0"}"#;
        assert!(GossipMessage::from_json(json).is_err());
    }

    #[test]
    fn test_relay_decrements_ttl() {
        let msg = GossipMessage::new(
            "node-1",
            GossipPayload::Join(JoinData { peer: peer() }),
            2,
        );
        let hop1 = msg.relayed().unwrap();
        assert_eq!(hop1.ttl, 1);
        assert_eq!(hop1.message_id, msg.message_id);
        let hop2 = hop1.relayed().unwrap();
        assert_eq!(hop2.ttl, 0);
        assert!(hop2.relayed().is_none());
    }

    #[test]
    fn test_json_roundtrip_keeps_payload() {
        let msg = GossipMessage::new(
            "node-1",
            GossipPayload::Gossip(GossipData {
                topic: "registry".to_string(),
                content: json!({ "epoch": 7 }),
            }),
            3,
        );
        let parsed = GossipMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed.payload, msg.payload);
        assert_eq!(parsed.message_id, msg.message_id);
    }
}
