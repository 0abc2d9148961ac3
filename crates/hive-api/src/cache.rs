//! Per-URL response cache backing the `max_cache_age` request hint.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: Value,
    fetched_at: Instant,
}

/// Thread-safe store of the last JSON body fetched per URL.
///
/// Entries are only dropped by [`evict_expired`](Self::evict_expired) or
/// [`clear`](Self::clear); callers owning a long-lived client sweep it
/// periodically.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached body for `url` if it is younger than `max_age`.
    pub fn get_fresh(&self, url: &str, max_age: Duration) -> Option<Value> {
        let cached = self.entries.get(url)?;
        (cached.fetched_at.elapsed() < max_age).then(|| cached.body.clone())
    }

    pub fn insert(&self, url: String, body: Value) {
        self.entries.insert(
            url,
            CachedResponse {
                body,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop bodies fetched at least `max_age` ago. Returns how many were
    /// removed.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, cached| cached.fetched_at.elapsed() < max_age);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "evicted expired responses");
        }
        evicted
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
