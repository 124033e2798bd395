//! Change detection for graph recomputation.
//!
//! A [`GraphKey`] identifies the inputs of one graph. A [`MemoSlot`] keeps the
//! latest result and refuses results from calls that were overtaken by a
//! newer one.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::aggregate::AggregationKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphKey {
    pub field: String,
    pub aggregation: Option<AggregationKind>,
    pub points_fingerprint: u64,
}

impl GraphKey {
    /// Fingerprints `points` by their JSON encoding, so structurally equal
    /// point sets give equal keys.
    pub fn new<P: Serialize>(
        field: impl Into<String>,
        aggregation: Option<AggregationKind>,
        points: &[P],
    ) -> serde_json::Result<Self> {
        let encoded = serde_json::to_vec(points)?;
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);
        Ok(Self {
            field: field.into(),
            aggregation,
            points_fingerprint: hasher.finish(),
        })
    }
}

#[derive(Debug)]
pub struct MemoSlot<K, V> {
    issued: u64,
    published: Option<u64>,
    entry: Option<(K, V)>,
}

impl<K, V> Default for MemoSlot<K, V> {
    fn default() -> Self {
        Self {
            issued: 0,
            published: None,
            entry: None,
        }
    }
}

impl<K: PartialEq, V> MemoSlot<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the ticket for a new computation. Tickets increase strictly.
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Stores a finished result unless a later ticket was already published.
    /// Returns whether the result was kept.
    pub fn publish(&mut self, ticket: u64, key: K, value: V) -> bool {
        if self.published.is_some_and(|latest| ticket <= latest) {
            return false;
        }
        self.published = Some(ticket);
        self.entry = Some((key, value));
        true
    }

    /// The cached value, if it was computed for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entry
            .as_ref()
            .filter(|(cached, _)| cached == key)
            .map(|(_, value)| value)
    }

    pub fn latest(&self) -> Option<&V> {
        self.entry.as_ref().map(|(_, value)| value)
    }

    /// Drops the cached entry and refuses every ticket issued so far, so a
    /// computation started before the clear cannot repopulate the slot.
    pub fn clear(&mut self) {
        self.entry = None;
        self.published = Some(self.issued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(points: &[i64], aggregation: AggregationKind) -> GraphKey {
        GraphKey::new("rsrp", Some(aggregation), points).unwrap()
    }

    #[test]
    fn test_key_tracks_inputs() {
        let a = key(&[1, 2, 3], AggregationKind::Average);
        assert_eq!(a, key(&[1, 2, 3], AggregationKind::Average));
        assert_ne!(a, key(&[1, 2, 4], AggregationKind::Average));
        assert_ne!(a, key(&[1, 2, 3], AggregationKind::Maximum));
    }

    #[test]
    fn test_cache_hit_only_for_same_key() {
        let mut slot = MemoSlot::new();
        let ticket = slot.begin();
        assert!(slot.publish(ticket, key(&[1], AggregationKind::Sum), "graph"));
        assert_eq!(slot.get(&key(&[1], AggregationKind::Sum)), Some(&"graph"));
        assert_eq!(slot.get(&key(&[2], AggregationKind::Sum)), None);
    }

    #[test]
    fn test_latest_call_wins() {
        let mut slot = MemoSlot::new();
        let slow = slot.begin();
        let fast = slot.begin();
        assert!(slot.publish(fast, 2, "new"));
        assert!(!slot.publish(slow, 1, "stale"));
        assert_eq!(slot.latest(), Some(&"new"));
        assert_eq!(slot.get(&1), None);

        slot.clear();
        assert_eq!(slot.latest(), None);
    }

    #[test]
    fn test_clear_refuses_in_flight_tickets() {
        let mut slot = MemoSlot::new();
        let before = slot.begin();
        slot.clear();
        assert!(!slot.publish(before, 1, "computed from old data"));
        assert_eq!(slot.get(&1), None);

        let after = slot.begin();
        assert!(slot.publish(after, 1, "fresh"));
        assert_eq!(slot.get(&1), Some(&"fresh"));
    }
}
