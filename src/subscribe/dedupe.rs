//! Bounded de-duplication cache for regular messages.
//!
//! Keyed by `(timetoken, channel)`; the underscore-joined string form only
//! survives as the rendered identifier. Each key holds the list of distinct
//! payloads seen under it, and a parallel insertion-ordered sequence drives
//! oldest-first eviction.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub timetoken: u64,
    pub channel: String,
}

impl DedupeKey {
    pub fn new(timetoken: u64, channel: impl Into<String>) -> Self {
        Self {
            timetoken,
            channel: channel.into(),
        }
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.timetoken, self.channel)
    }
}

#[derive(Debug, Default)]
pub struct DedupeCache {
    payloads: HashMap<DedupeKey, Vec<Value>>,
    order: VecDeque<DedupeKey>,
}

impl DedupeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked identifiers (with multiplicity).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Record a payload under its identifier. Returns false when the same
    /// payload was already seen there (a duplicate); the cache is unchanged
    /// in that case.
    pub fn try_insert(&mut self, key: DedupeKey, payload: &Value) -> bool {
        match self.payloads.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().contains(payload) {
                    return false;
                }
                entry.get_mut().push(payload.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![payload.clone()]);
            }
        }
        self.order.push_back(key);
        true
    }

    /// Evict oldest identifiers until at most `capacity` remain, freeing one
    /// payload per eviction.
    pub fn evict_to(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if let Some(list) = self.payloads.get_mut(&key) {
                if !list.is_empty() {
                    list.remove(0);
                }
                if list.is_empty() {
                    self.payloads.remove(&key);
                }
            }
        }
    }

    /// Drop every identifier whose timetoken is at or past `timetoken`.
    pub fn purge_newer_than(&mut self, timetoken: u64) {
        self.payloads.retain(|key, _| key.timetoken < timetoken);
        self.order.retain(|key| key.timetoken < timetoken);
    }

    pub fn clear(&mut self) {
        self.payloads.clear();
        self.order.clear();
    }

    #[cfg(test)]
    fn contains(&self, key: &DedupeKey) -> bool {
        self.payloads.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_detection() {
        let mut cache = DedupeCache::new();
        let key = DedupeKey::new(21, "a");
        assert!(cache.try_insert(key.clone(), &json!("y")));
        assert!(!cache.try_insert(key.clone(), &json!("y")));
        // Different payload under the same identifier is novel.
        assert!(cache.try_insert(key, &json!("z")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evict_oldest_first() {
        let mut cache = DedupeCache::new();
        for timetoken in 1..=5 {
            cache.try_insert(DedupeKey::new(timetoken, "a"), &json!(timetoken));
        }
        cache.evict_to(2);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&DedupeKey::new(1, "a")));
        assert!(!cache.contains(&DedupeKey::new(3, "a")));
        assert!(cache.contains(&DedupeKey::new(4, "a")));
        assert!(cache.contains(&DedupeKey::new(5, "a")));
    }

    #[test]
    fn test_evict_frees_one_payload_per_identifier() {
        let mut cache = DedupeCache::new();
        let key = DedupeKey::new(7, "a");
        cache.try_insert(key.clone(), &json!("x"));
        cache.try_insert(key.clone(), &json!("y"));
        cache.evict_to(1);
        // One payload freed; the identifier entry survives with the newer one.
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key));
        assert!(!cache.try_insert(key, &json!("y")));
    }

    #[test]
    fn test_purge_newer_than_is_idempotent() {
        let mut cache = DedupeCache::new();
        cache.try_insert(DedupeKey::new(50, "a"), &json!("x"));
        cache.try_insert(DedupeKey::new(80, "a"), &json!("y"));
        cache.purge_newer_than(60);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&DedupeKey::new(50, "a")));
        cache.purge_newer_than(60);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_boundary_is_inclusive() {
        let mut cache = DedupeCache::new();
        cache.try_insert(DedupeKey::new(60, "a"), &json!("x"));
        cache.purge_newer_than(60);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_identifier_rendering() {
        assert_eq!(DedupeKey::new(80, "a").to_string(), "80_a");
    }
}
