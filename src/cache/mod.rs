//! Working Cache
//!
//! Bounded, TTL-expiring map from record id to the last-known record. Keys
//! keep their load order so a cycle visits records in the order the store
//! returned them. The store stays the source of truth.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::catalog::Record;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    record: Record,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order of the ids in `entries`
    order: VecDeque<String>,
}

impl CacheState {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let entries = &self.entries;
        self.order.retain(|id| entries.contains_key(id));
        before - self.entries.len()
    }

    fn insert(&mut self, id: String, record: Record, expires_at: Instant, max_entries: usize, now: Instant) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.record = record;
            entry.expires_at = expires_at;
            return;
        }

        if self.entries.len() >= max_entries {
            self.purge_expired(now);
        }
        while self.entries.len() >= max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    debug!("Working cache full, evicting {}", oldest);
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.order.push_back(id.clone());
        self.entries.insert(id, CacheEntry { record, expires_at });
    }
}

/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct WorkingCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
    max_entries: usize,
}

impl WorkingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Capacity bound; must be non-zero.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        debug_assert!(max_entries > 0, "working cache capacity must be non-zero");
        self.max_entries = max_entries;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert every record with expiration set to now + TTL.
    pub async fn load(&self, records: Vec<Record>) {
        let now = Instant::now();
        let expires_at = now + self.ttl;
        let mut state = self.state.write().await;
        for record in records {
            state.insert(record.id.clone(), record, expires_at, self.max_entries, now);
        }
    }

    /// The cached record, or `None` if it was never inserted or has expired.
    pub async fn get(&self, id: &str) -> Option<Record> {
        let now = Instant::now();
        let state = self.state.read().await;
        state.entries
            .get(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.record.clone())
    }

    /// Overwrite an entry and reset its expiration.
    pub async fn put(&self, id: &str, record: Record) {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.insert(id.to_string(), record, now + self.ttl, self.max_entries, now);
    }

    /// Ids of live entries in insertion order, captured at call time.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let state = self.state.read().await;
        state.order
            .iter()
            .filter(|id| state.entries.get(*id).is_some_and(|entry| entry.is_live(now)))
            .cloned()
            .collect()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.read().await;
        state.entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut state = self.state.write().await;
        state.purge_expired(Instant::now())
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.order.clear();
    }
}

impl Default for WorkingCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> Record {
        Record::new(id, format!("Title {}", id))
    }

    #[tokio::test]
    async fn test_cache_load_get() {
        let cache = WorkingCache::default();
        cache.load(vec![record("a"), record("b")]).await;

        assert_eq!(cache.get("a").await.unwrap().title, "Title a");
        assert!(cache.get("missing").await.is_none());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_keys_keep_insertion_order() {
        let cache = WorkingCache::default();
        cache.load(vec![record("c"), record("a"), record("b")]).await;
        cache.put("a", record("a").with_caption("new")).await;

        assert_eq!(cache.keys().await, vec!["c", "a", "b"]);
        assert_eq!(cache.get("a").await.unwrap().caption, "new");
    }

    #[tokio::test]
    async fn test_keys_is_a_snapshot() {
        let cache = WorkingCache::default();
        cache.load(vec![record("a")]).await;

        let keys = cache.keys().await;
        cache.put("b", record("b")).await;

        assert_eq!(keys, vec!["a"]);
        assert_eq!(cache.keys().await, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_absent() {
        let cache = WorkingCache::new(Duration::from_secs(60));
        cache.load(vec![record("a"), record("b")]).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.put("b", record("b")).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert_eq!(cache.keys().await, vec!["b"]);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = WorkingCache::new(Duration::from_secs(10));
        cache.load(vec![record("a"), record("b")]).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put("c", record("c")).await;

        assert_eq!(cache.purge_expired().await, 2);
        assert_eq!(cache.keys().await, vec!["c"]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = WorkingCache::default().with_max_entries(2);
        cache.load(vec![record("a"), record("b"), record("c")]).await;

        assert_eq!(cache.keys().await, vec!["b", "c"]);
        assert!(cache.get("a").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_prefers_expired_entries() {
        let cache = WorkingCache::new(Duration::from_secs(10)).with_max_entries(2);
        cache.load(vec![record("a")]).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.put("b", record("b")).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        // "a" has expired, so it makes room instead of "b"
        cache.put("c", record("c")).await;
        assert_eq!(cache.keys().await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = WorkingCache::default();
        cache.load(vec![record("a")]).await;
        cache.clear().await;

        assert!(cache.is_empty().await);
        assert!(cache.keys().await.is_empty());
    }
}
