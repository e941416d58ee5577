//! Peer Directory
//!
//! In-memory table of every signer node this node has heard of. Entries
//! are never removed, only demoted to `inactive`, so the table doubles as
//! an audit trail.
//!
//! Status transitions:
//! - `active -> suspected`: silence longer than the suspicion timeout,
//!   failed health probe, or the gossip connection to the node dropped
//! - `suspected -> inactive`: silence longer than the cleanup timeout
//! - `any -> inactive`: explicit `leave`
//! - `suspected/inactive -> active`: discovery, join, heartbeat or a
//!   successful health probe
//!
//! The directory is owned by the gossip protocol, which wraps it in a
//! `tokio::sync::RwLock`; readers (selector, API) take snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::message::{NodeId, PeerInfo};

/// Liveness status of a known node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Active,
    Suspected,
    Inactive,
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerStatus::Active => write!(f, "active"),
            PeerStatus::Suspected => write!(f, "suspected"),
            PeerStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A known signer node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerNode {
    pub node_id: NodeId,
    pub public_key: String,
    pub api_endpoint: String,
    pub gossip_endpoint: String,
    pub status: PeerStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: DateTime<Utc>,
    pub region: String,
    pub capabilities: Vec<String>,
    pub version: String,
    pub heartbeat_count: u64,
}

impl PeerNode {
    /// New active entry
    pub fn new(info: PeerInfo, now: DateTime<Utc>) -> Self {
        Self {
            node_id: info.node_id,
            public_key: info.public_key,
            api_endpoint: info.api_endpoint,
            gossip_endpoint: info.gossip_endpoint,
            status: PeerStatus::Active,
            last_seen: now,
            region: info.region,
            capabilities: info.capabilities,
            version: info.version,
            heartbeat_count: 0,
        }
    }

    /// Advertised form, for discovery responses
    pub fn to_info(&self) -> PeerInfo {
        PeerInfo {
            node_id: self.node_id.clone(),
            public_key: self.public_key.clone(),
            api_endpoint: self.api_endpoint.clone(),
            gossip_endpoint: self.gossip_endpoint.clone(),
            region: self.region.clone(),
            capabilities: self.capabilities.clone(),
            version: self.version.clone(),
        }
    }

    /// Time since the last evidence of liveness
    pub fn silence(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }

    /// Active and heard from within `suspicion_timeout`
    pub fn is_healthy(&self, now: DateTime<Utc>, suspicion_timeout: Duration) -> bool {
        self.status == PeerStatus::Active && self.silence(now) < suspicion_timeout
    }
}

/// What `upsert` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    /// Was suspected or inactive, now active again
    Reactivated,
    Refreshed,
}

/// Result of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub suspected: Vec<NodeId>,
    pub inactivated: Vec<NodeId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.suspected.is_empty() && self.inactivated.is_empty()
    }
}

/// Status counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub suspected: usize,
    pub inactive: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.active + self.suspected + self.inactive
    }
}

/// Known nodes keyed by node id
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    nodes: HashMap<NodeId, PeerNode>,
    suspicion_timeout: Duration,
    cleanup_timeout: Duration,
}

impl PeerDirectory {
    pub fn new(suspicion_timeout_ms: u64, cleanup_timeout_ms: u64) -> Self {
        Self {
            nodes: HashMap::new(),
            suspicion_timeout: Duration::milliseconds(suspicion_timeout_ms as i64),
            cleanup_timeout: Duration::milliseconds(cleanup_timeout_ms as i64),
        }
    }

    pub fn suspicion_timeout(&self) -> Duration {
        self.suspicion_timeout
    }

    /// Create or refresh an entry from advertised info.
    ///
    /// The heartbeat counter restarts only when a non-active node comes
    /// back.
    pub fn upsert(&mut self, info: PeerInfo, now: DateTime<Utc>) -> UpsertOutcome {
        match self.nodes.get_mut(&info.node_id) {
            None => {
                info!(node_id = %info.node_id, endpoint = %info.gossip_endpoint, "Discovered peer");
                self.nodes.insert(info.node_id.clone(), PeerNode::new(info, now));
                UpsertOutcome::Created
            }
            Some(node) => {
                node.public_key = info.public_key;
                node.api_endpoint = info.api_endpoint;
                node.gossip_endpoint = info.gossip_endpoint;
                node.region = info.region;
                node.capabilities = info.capabilities;
                node.version = info.version;
                node.last_seen = now;
                if node.status != PeerStatus::Active {
                    info!(node_id = %node.node_id, previous = %node.status, "Peer active again");
                    node.status = PeerStatus::Active;
                    node.heartbeat_count = 0;
                    UpsertOutcome::Reactivated
                } else {
                    UpsertOutcome::Refreshed
                }
            }
        }
    }

    /// active -> suspected; no-op for any other status
    pub fn mark_suspected(&mut self, node_id: &str) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) if node.status == PeerStatus::Active => {
                node.status = PeerStatus::Suspected;
                info!(node_id = %node_id, "Peer suspected");
                true
            }
            _ => false,
        }
    }

    /// Any status -> inactive (explicit leave)
    pub fn mark_inactive(&mut self, node_id: &str) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) if node.status != PeerStatus::Inactive => {
                node.status = PeerStatus::Inactive;
                info!(node_id = %node_id, "Peer inactive");
                true
            }
            _ => false,
        }
    }

    /// Suspect every active entry advertising `gossip_endpoint`
    pub fn mark_suspected_by_endpoint(&mut self, gossip_endpoint: &str) -> Vec<NodeId> {
        let ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.gossip_endpoint == gossip_endpoint && n.status == PeerStatus::Active)
            .map(|n| n.node_id.clone())
            .collect();
        for id in &ids {
            self.mark_suspected(id);
        }
        ids
    }

    /// Heartbeat from a known node. Unknown nodes are ignored until they
    /// are discovered with full info.
    pub fn record_heartbeat(&mut self, node_id: &str, now: DateTime<Utc>) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                if node.status != PeerStatus::Active {
                    info!(node_id = %node_id, previous = %node.status, "Peer active again (heartbeat)");
                }
                node.last_seen = now;
                node.status = PeerStatus::Active;
                node.heartbeat_count += 1;
                true
            }
            None => {
                debug!(node_id = %node_id, "Heartbeat from unknown peer");
                false
            }
        }
    }

    /// Successful health probe: refresh liveness without counting a heartbeat
    pub fn mark_alive(&mut self, node_id: &str, now: DateTime<Utc>) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                if node.status != PeerStatus::Active {
                    info!(node_id = %node_id, previous = %node.status, "Peer active again (health check)");
                }
                node.last_seen = now;
                node.status = PeerStatus::Active;
                true
            }
            None => false,
        }
    }

    /// Apply silence timeouts to every entry.
    ///
    /// Active entries can only move to suspected; suspected entries move to
    /// inactive once the cleanup timeout has also passed. Nothing is removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        for node in self.nodes.values_mut() {
            let silence = now - node.last_seen;
            match node.status {
                PeerStatus::Active if silence > self.suspicion_timeout => {
                    node.status = PeerStatus::Suspected;
                    report.suspected.push(node.node_id.clone());
                }
                PeerStatus::Suspected if silence > self.cleanup_timeout => {
                    node.status = PeerStatus::Inactive;
                    report.inactivated.push(node.node_id.clone());
                }
                _ => {}
            }
        }
        if !report.is_empty() {
            info!(
                suspected = report.suspected.len(),
                inactive = report.inactivated.len(),
                "Directory sweep changed peer status"
            );
        }
        report
    }

    pub fn get(&self, node_id: &str) -> Option<&PeerNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// All entries, including inactive ones, ordered by node id
    pub fn all(&self) -> Vec<PeerNode> {
        let mut nodes: Vec<PeerNode> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes
    }

    /// Entries with the given status
    pub fn with_status(&self, status: PeerStatus) -> Vec<PeerNode> {
        self.all().into_iter().filter(|n| n.status == status).collect()
    }

    /// Entries passing the healthy predicate
    pub fn healthy(&self, now: DateTime<Utc>) -> Vec<PeerNode> {
        self.all()
            .into_iter()
            .filter(|n| n.is_healthy(now, self.suspicion_timeout))
            .collect()
    }

    pub fn is_healthy(&self, node_id: &str, now: DateTime<Utc>) -> bool {
        self.nodes
            .get(node_id)
            .map(|n| n.is_healthy(now, self.suspicion_timeout))
            .unwrap_or(false)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for node in self.nodes.values() {
            match node.status {
                PeerStatus::Active => counts.active += 1,
                PeerStatus::Suspected => counts.suspected += 1,
                PeerStatus::Inactive => counts.inactive += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> PeerInfo {
        PeerInfo::new(
            id,
            format!("0x{}", id),
            format!("https://{}.example.com", id),
            format!("wss://{}.example.com/gossip", id),
            "default",
        )
    }

    fn directory() -> PeerDirectory {
        PeerDirectory::new(30_000, 120_000)
    }

    #[test]
    fn test_upsert_creates_and_refreshes() {
        let mut dir = directory();
        let t0 = Utc::now();
        assert_eq!(dir.upsert(info("a"), t0), UpsertOutcome::Created);
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Active);
        assert_eq!(dir.get("a").unwrap().heartbeat_count, 0);

        dir.record_heartbeat("a", t0);
        dir.record_heartbeat("a", t0);
        let t1 = t0 + Duration::seconds(5);
        assert_eq!(dir.upsert(info("a"), t1), UpsertOutcome::Refreshed);
        let node = dir.get("a").unwrap();
        assert_eq!(node.heartbeat_count, 2);
        assert_eq!(node.last_seen, t1);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_upsert_reactivation_resets_heartbeats() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);
        dir.record_heartbeat("a", t0);
        dir.mark_suspected("a");

        assert_eq!(dir.upsert(info("a"), t0), UpsertOutcome::Reactivated);
        let node = dir.get("a").unwrap();
        assert_eq!(node.status, PeerStatus::Active);
        assert_eq!(node.heartbeat_count, 0);
    }

    #[test]
    fn test_mark_suspected_only_from_active() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);
        assert!(dir.mark_suspected("a"));
        assert!(!dir.mark_suspected("a"));

        dir.mark_inactive("a");
        assert!(!dir.mark_suspected("a"));
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Inactive);
        assert!(!dir.mark_suspected("missing"));
    }

    #[test]
    fn test_heartbeat_counts_and_reactivates() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);
        dir.mark_suspected("a");

        let t1 = t0 + Duration::seconds(1);
        assert!(dir.record_heartbeat("a", t1));
        let node = dir.get("a").unwrap();
        assert_eq!(node.status, PeerStatus::Active);
        assert_eq!(node.heartbeat_count, 1);
        assert_eq!(node.last_seen, t1);

        assert!(!dir.record_heartbeat("unknown", t1));
        assert!(!dir.contains("unknown"));
    }

    #[test]
    fn test_sweep_never_skips_suspected() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);

        // Within suspicion timeout: unchanged
        assert!(dir.sweep(t0 + Duration::seconds(10)).is_empty());

        // Even far past cleanup, an active node only becomes suspected
        let late = t0 + Duration::seconds(600);
        let report = dir.sweep(late);
        assert_eq!(report.suspected, vec!["a".to_string()]);
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Suspected);

        let report = dir.sweep(late);
        assert_eq!(report.inactivated, vec!["a".to_string()]);
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Inactive);

        // Never removed
        dir.sweep(late + Duration::seconds(600));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_sweep_timeline() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);

        dir.sweep(t0 + Duration::seconds(31));
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Suspected);

        dir.sweep(t0 + Duration::seconds(100));
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Suspected);

        dir.sweep(t0 + Duration::seconds(121));
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Inactive);
    }

    #[test]
    fn test_suspect_by_endpoint() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);
        dir.upsert(info("b"), t0);

        let suspected = dir.mark_suspected_by_endpoint("wss://a.example.com/gossip");
        assert_eq!(suspected, vec!["a".to_string()]);
        assert_eq!(dir.get("a").unwrap().status, PeerStatus::Suspected);
        assert_eq!(dir.get("b").unwrap().status, PeerStatus::Active);
    }

    #[test]
    fn test_healthy_predicate() {
        let mut dir = directory();
        let t0 = Utc::now();
        dir.upsert(info("a"), t0);
        dir.upsert(info("b"), t0 - Duration::seconds(40));
        dir.upsert(info("c"), t0);
        dir.mark_suspected("c");

        // b is still marked active but stale
        let healthy: Vec<String> = dir.healthy(t0).into_iter().map(|n| n.node_id).collect();
        assert_eq!(healthy, vec!["a".to_string()]);
        assert!(!dir.is_healthy("b", t0));

        let counts = dir.counts();
        assert_eq!(counts.active, 2);
        assert_eq!(counts.suspected, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut dir = directory();
        dir.upsert(info("a"), Utc::now());
        let json = serde_json::to_value(dir.get("a").unwrap()).unwrap();
        assert_eq!(json["nodeId"], "a");
        assert_eq!(json["status"], "active");
        assert_eq!(json["heartbeatCount"], 0);
        assert!(json["lastSeen"].is_i64());
    }
}
