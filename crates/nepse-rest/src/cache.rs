//! In-memory TTL response cache
//!
//! Keeps recently fetched JSON bodies keyed by endpoint so bursts of calls
//! don't hammer the portal. Entries expire on read; there is no background
//! sweeper.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

/// TTL cache for JSON response bodies
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedEntry>,
    default_ttl: Duration,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    expires_at: Instant,
}

impl ResponseCache {
    /// Create a cache with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Cached value for `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, with an optional TTL override
    pub fn insert(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries.insert(
            key.into(),
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop all cached entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently held (including not-yet-collected expired
    /// ones)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(30));
        cache.insert("status", json!({"isOpen": "OPEN"}), None);
        assert_eq!(cache.get("status"), Some(json!({"isOpen": "OPEN"})));
    }

    #[test]
    fn test_expired_entries_are_dropped_on_read() {
        let cache = ResponseCache::new(Duration::from_secs(30));
        cache.insert("status", json!(1), Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("status"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_per_insert_ttl_overrides_default() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        cache.insert("listing", json!([1, 2, 3]), Some(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("listing"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = ResponseCache::new(Duration::from_secs(30));
        cache.insert("a", json!(1), None);
        cache.insert("b", json!(2), None);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
