//! Signer Selector
//!
//! Picks a signing committee from the peer directory. Only healthy nodes
//! (active and heard from within the suspicion timeout) are candidates.
//!
//! ```text
//! score = 100 - min(silence_secs, 50) + min(heartbeats, 20) + jitter[0, 20)
//! ```
//!
//! The jitter spreads signing load when scores are close. The RNG is
//! injectable so tests can seed it.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use aggsig_core::{SCORE_BASE, SCORE_JITTER, SCORE_MAX_AGE_PENALTY, SCORE_MAX_HEARTBEAT_BONUS};

use crate::directory::PeerNode;
use crate::error::{NetworkError, NetworkResult};

/// Committee selector
#[derive(Debug)]
pub struct SignerSelector<R: Rng = StdRng> {
    rng: R,
    suspicion_timeout: Duration,
}

impl SignerSelector<StdRng> {
    /// Selector seeded from OS entropy
    pub fn new(suspicion_timeout_ms: u64) -> Self {
        Self::with_rng(suspicion_timeout_ms, StdRng::from_entropy())
    }

    /// Reproducible selector
    pub fn seeded(suspicion_timeout_ms: u64, seed: u64) -> Self {
        Self::with_rng(suspicion_timeout_ms, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SignerSelector<R> {
    pub fn with_rng(suspicion_timeout_ms: u64, rng: R) -> Self {
        Self {
            rng,
            suspicion_timeout: Duration::milliseconds(suspicion_timeout_ms as i64),
        }
    }

    /// Score one candidate (higher is better)
    pub fn score(&mut self, node: &PeerNode, now: DateTime<Utc>) -> f64 {
        let silence_secs = node.silence(now).num_milliseconds().max(0) as f64 / 1000.0;
        let age_penalty = silence_secs.min(SCORE_MAX_AGE_PENALTY);
        let heartbeat_bonus = node.heartbeat_count.min(SCORE_MAX_HEARTBEAT_BONUS) as f64;
        let jitter = self.rng.gen_range(0.0..SCORE_JITTER);
        SCORE_BASE - age_penalty + heartbeat_bonus + jitter
    }

    /// Select the `count` best-scoring healthy nodes out of `peers`
    pub fn select_signers(
        &mut self,
        peers: &[PeerNode],
        count: usize,
        now: DateTime<Utc>,
    ) -> NetworkResult<Vec<PeerNode>> {
        let candidates: Vec<&PeerNode> = peers
            .iter()
            .filter(|n| n.is_healthy(now, self.suspicion_timeout))
            .collect();

        if candidates.len() < count {
            return Err(NetworkError::InsufficientSigners {
                needed: count,
                available: candidates.len(),
            });
        }

        let mut scored: Vec<(f64, &PeerNode)> = candidates
            .into_iter()
            .map(|n| (self.score(n, now), n))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let selected: Vec<PeerNode> = scored
            .into_iter()
            .take(count)
            .map(|(_, n)| n.clone())
            .collect();

        debug!(
            count,
            selected = ?selected.iter().map(|n| n.node_id.as_str()).collect::<Vec<_>>(),
            "Selected signers"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{PeerDirectory, PeerStatus};
    use crate::message::PeerInfo;
    use std::collections::HashSet;

    const SUSPICION_MS: u64 = 30_000;

    fn info(id: &str) -> PeerInfo {
        PeerInfo::new(
            id,
            format!("0x{}", id),
            format!("https://{}.example.com", id),
            format!("wss://{}.example.com/gossip", id),
            "default",
        )
    }

    fn directory_with(ids: &[&str], now: DateTime<Utc>) -> PeerDirectory {
        let mut dir = PeerDirectory::new(SUSPICION_MS, 120_000);
        for id in ids {
            dir.upsert(info(id), now);
        }
        dir
    }

    #[test]
    fn test_exact_count_returns_all() {
        let now = Utc::now();
        let dir = directory_with(&["a", "b", "c"], now);
        let mut selector = SignerSelector::seeded(SUSPICION_MS, 7);

        let selected = selector.select_signers(&dir.all(), 3, now).unwrap();
        let ids: HashSet<String> = selected.into_iter().map(|n| n.node_id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("a") && ids.contains("b") && ids.contains("c"));
    }

    #[test]
    fn test_insufficient_signers() {
        let now = Utc::now();
        let dir = directory_with(&["a", "b"], now);
        let mut selector = SignerSelector::seeded(SUSPICION_MS, 7);

        let err = selector.select_signers(&dir.all(), 3, now).unwrap_err();
        match err {
            NetworkError::InsufficientSigners { needed, available } => {
                assert_eq!(needed, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_only_healthy_nodes_selected() {
        let now = Utc::now();
        let mut dir = directory_with(&["a", "b", "c", "d"], now);
        dir.mark_suspected("b");
        dir.mark_inactive("c");
        // Still active but stale
        dir.upsert(info("d"), now - Duration::seconds(45));

        let mut selector = SignerSelector::seeded(SUSPICION_MS, 1);
        let selected = selector.select_signers(&dir.all(), 1, now).unwrap();
        assert_eq!(selected[0].node_id, "a");
        assert_eq!(selected[0].status, PeerStatus::Active);

        assert!(matches!(
            selector.select_signers(&dir.all(), 2, now),
            Err(NetworkError::InsufficientSigners { needed: 2, available: 1 })
        ));
    }

    #[test]
    fn test_selection_size_and_health() {
        let now = Utc::now();
        let ids: Vec<String> = (0..10).map(|i| format!("node-{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let dir = directory_with(&refs, now);

        let mut selector = SignerSelector::new(SUSPICION_MS);
        for _ in 0..20 {
            let selected = selector.select_signers(&dir.all(), 4, now).unwrap();
            assert_eq!(selected.len(), 4);
            let unique: HashSet<&str> = selected.iter().map(|n| n.node_id.as_str()).collect();
            assert_eq!(unique.len(), 4);
            assert!(selected.iter().all(|n| dir.is_healthy(&n.node_id, now)));
        }
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let now = Utc::now();
        let ids: Vec<String> = (0..8).map(|i| format!("node-{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let dir = directory_with(&refs, now);

        let pick = |seed| {
            SignerSelector::seeded(SUSPICION_MS, seed)
                .select_signers(&dir.all(), 3, now)
                .unwrap()
                .into_iter()
                .map(|n| n.node_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(42), pick(42));
    }

    #[test]
    fn test_score_bounds() {
        let now = Utc::now();
        let mut dir = directory_with(&["fresh"], now);
        for _ in 0..50 {
            dir.record_heartbeat("fresh", now);
        }
        let mut selector = SignerSelector::seeded(SUSPICION_MS, 3);
        let node = dir.get("fresh").unwrap().clone();

        let score = selector.score(&node, now);
        // heartbeat bonus capped at 20, jitter below 20
        assert!(score >= 120.0 && score < 140.0);

        let mut stale = node.clone();
        stale.heartbeat_count = 0;
        stale.last_seen = now - Duration::seconds(500);
        let score = selector.score(&stale, now);
        assert!(score >= 50.0 && score < 70.0);
    }

    #[test]
    fn test_zero_count() {
        let now = Utc::now();
        let dir = directory_with(&[], now);
        let mut selector = SignerSelector::seeded(SUSPICION_MS, 0);
        assert!(selector.select_signers(&dir.all(), 0, now).unwrap().is_empty());
    }
}
