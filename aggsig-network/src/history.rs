//! Message History
//!
//! Bounded de-duplication cache keyed by message id. Also remembers which
//! peers each message has already been forwarded to.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::message::MessageId;

/// One seen message
#[derive(Debug, Clone)]
pub struct MessageHistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Peer keys (gossip endpoints or inbound connection keys)
    pub propagated_to: HashSet<String>,
}

/// FIFO-bounded set of seen message ids
#[derive(Debug)]
pub struct MessageHistory {
    capacity: usize,
    order: VecDeque<MessageId>,
    entries: HashMap<MessageId, MessageHistoryEntry>,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Record a message id. Returns `false` if it was already present.
    pub fn insert(&mut self, message_id: &str, timestamp: DateTime<Utc>) -> bool {
        if self.entries.contains_key(message_id) {
            return false;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(message_id.to_string());
        self.entries.insert(
            message_id.to_string(),
            MessageHistoryEntry {
                timestamp,
                propagated_to: HashSet::new(),
            },
        );
        true
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries.contains_key(message_id)
    }

    pub fn get(&self, message_id: &str) -> Option<&MessageHistoryEntry> {
        self.entries.get(message_id)
    }

    /// Whether `peer` already received `message_id` from this node
    pub fn was_propagated_to(&self, message_id: &str, peer: &str) -> bool {
        self.entries
            .get(message_id)
            .map(|e| e.propagated_to.contains(peer))
            .unwrap_or(false)
    }

    pub fn record_propagation(&mut self, message_id: &str, peer: &str) {
        if let Some(entry) = self.entries.get_mut(message_id) {
            entry.propagated_to.insert(peer.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_detection() {
        let mut history = MessageHistory::new(10);
        let now = Utc::now();
        assert!(history.insert("m1", now));
        assert!(!history.insert("m1", now));
        assert!(history.contains("m1"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut history = MessageHistory::new(3);
        let now = Utc::now();
        for id in ["m1", "m2", "m3", "m4"] {
            history.insert(id, now);
        }
        assert_eq!(history.len(), 3);
        assert!(!history.contains("m1"));
        assert!(history.contains("m2"));
        assert!(history.contains("m4"));
    }

    #[test]
    fn test_propagation_tracking() {
        let mut history = MessageHistory::new(10);
        history.insert("m1", Utc::now());
        history.record_propagation("m1", "wss://a.example.com/gossip");

        assert!(history.was_propagated_to("m1", "wss://a.example.com/gossip"));
        assert!(!history.was_propagated_to("m1", "wss://b.example.com/gossip"));
        // Unknown ids are ignored
        history.record_propagation("m2", "wss://a.example.com/gossip");
        assert!(!history.contains("m2"));
    }
}
