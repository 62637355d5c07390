//! Memoized query responses, namespaced per server.
//!
//! [`ResponseCache`] is shared between the query API, which fills it, and
//! the trackers, which drop a whole namespace after every committed
//! recording cycle. Entries also expire after a fixed time-to-live.
//!
//! Each namespace carries a generation that [`ResponseCache::invalidate`]
//! bumps. A body computed under an older generation is discarded on
//! [`ResponseCache::put`], so a read racing a commit never outlives it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Default lifetime of a memoized response.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CachedResponse {
    value: serde_json::Value,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Namespace {
    generation: u64,
    entries: HashMap<String, CachedResponse>,
}

/// Cheap-to-clone handle onto the shared response memo.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Creates an empty cache with [`DEFAULT_RESPONSE_TTL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RESPONSE_TTL)
    }

    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Lifetime of a memoized response.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current generation of `namespace`. Pass it back to
    /// [`ResponseCache::put`] once the response is computed.
    pub async fn generation(&self, namespace: &str) -> u64 {
        let map = self.namespaces.read().await;
        map.get(namespace).map_or(0, |ns| ns.generation)
    }

    /// Returns the memoized response for `key` in `namespace` unless it has
    /// expired.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        let map = self.namespaces.read().await;
        map.get(namespace)
            .and_then(|ns| ns.entries.get(key))
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Memoizes `value` under `key` in `namespace` if it was computed under
    /// the namespace's current `generation`. Returns whether it was stored.
    pub async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
        generation: u64,
    ) -> bool {
        let mut map = self.namespaces.write().await;
        let ns = map.entry(namespace.to_string()).or_default();
        if ns.generation != generation {
            return false;
        }
        ns.entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        ns.entries.insert(
            key.to_string(),
            CachedResponse {
                value,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    /// Drops every entry of `namespace` and advances its generation,
    /// returning how many entries were dropped.
    pub async fn invalidate(&self, namespace: &str) -> usize {
        let mut map = self.namespaces.write().await;
        let ns = map.entry(namespace.to_string()).or_default();
        ns.generation = ns.generation.wrapping_add(1);
        let dropped = ns.entries.len();
        ns.entries.clear();
        dropped
    }

    /// Number of unexpired entries in `namespace`.
    pub async fn len(&self, namespace: &str) -> usize {
        let map = self.namespaces.read().await;
        map.get(namespace).map_or(0, |ns| {
            ns.entries
                .values()
                .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
                .count()
        })
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get() {
        let cache = ResponseCache::new();
        let generation = cache.generation("jp").await;
        assert!(
            cache
                .put("jp", "/event/jp/1/ranking-lines", json!({"a": 1}), generation)
                .await
        );
        assert_eq!(
            cache.get("jp", "/event/jp/1/ranking-lines").await,
            Some(json!({"a": 1}))
        );
        assert_eq!(cache.get("en", "/event/jp/1/ranking-lines").await, None);
    }

    #[tokio::test]
    async fn invalidate_only_touches_one_namespace() {
        let cache = ResponseCache::new();
        cache.put("jp", "a", json!(1), 0).await;
        cache.put("jp", "b", json!(2), 0).await;
        cache.put("en", "a", json!(3), 0).await;

        assert_eq!(cache.invalidate("jp").await, 2);
        assert_eq!(cache.len("jp").await, 0);
        assert_eq!(cache.len("en").await, 1);
        assert_eq!(cache.invalidate("jp").await, 0);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::with_ttl(Duration::from_millis(50));
        cache.put("kr", "k", json!(1), 0).await;
        assert_eq!(cache.get("kr", "k").await, Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("kr", "k").await, None);
        assert_eq!(cache.len("kr").await, 0);
    }

    #[tokio::test]
    async fn body_from_before_invalidation_is_discarded() {
        let cache = ResponseCache::new();
        let stale = cache.generation("cn").await;
        cache.invalidate("cn").await;

        assert!(!cache.put("cn", "k", json!("old"), stale).await);
        assert_eq!(cache.get("cn", "k").await, None);

        let fresh = cache.generation("cn").await;
        assert_ne!(fresh, stale);
        assert!(cache.put("cn", "k", json!("new"), fresh).await);
        assert_eq!(cache.get("cn", "k").await, Some(json!("new")));
    }

    #[test]
    fn clones_share_state() {
        let cache = ResponseCache::new();
        let other = cache.clone();
        tokio_test::block_on(other.put("tw", "k", json!(true), 0));
        assert_eq!(
            tokio_test::block_on(cache.get("tw", "k")),
            Some(json!(true))
        );
    }
}
