//! Gossip statistics and derived network health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::StatusCounts;

/// Counters exposed on `GET /stats`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GossipStats {
    pub total_peers: usize,
    pub active_peers: usize,
    pub suspected_peers: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub gossip_rounds: u64,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_gossip_time: Option<DateTime<Utc>>,
}

/// Derived node health
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkHealth {
    Healthy,
    Degraded,
    Isolated,
}

impl NetworkHealth {
    /// Isolated without active peers, degraded when suspects outnumber them
    pub fn from_counts(counts: &StatusCounts) -> Self {
        if counts.active == 0 {
            NetworkHealth::Isolated
        } else if counts.suspected > counts.active {
            NetworkHealth::Degraded
        } else {
            NetworkHealth::Healthy
        }
    }
}

impl std::fmt::Display for NetworkHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkHealth::Healthy => write!(f, "healthy"),
            NetworkHealth::Degraded => write!(f, "degraded"),
            NetworkHealth::Isolated => write!(f, "isolated"),
        }
    }
}
