//! Parsed-document cache owned by the artifact store
//!
//! Retrieval parses YAML on every call unless the parsed document is kept
//! here. The eviction policy is explicit: `Disabled`, `Unbounded` or a
//! capacity-limited LRU. With LRU, `get()` promotes the entry to
//! most-recently-used and `put()` evicts the least-recently-used entry when
//! the cache is full.

use crate::config::CachePolicy;
use crate::document::Artifact;
use crate::layer::Layer;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cache key: (layer, artifact id)
pub type CacheKey = (Layer, String);

/// Document cache with an explicit eviction policy
pub struct DocumentCache {
    policy: CachePolicy,
    inner: Mutex<CacheInner>,
}

/// Internal state for the cache.
#[derive(Default)]
struct CacheInner {
    map: HashMap<CacheKey, Arc<Artifact>>,
    /// LRU order: front = oldest, back = newest
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

/// Counters reported by [`DocumentCache::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl DocumentCache {
    /// Create a cache with the given policy.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Eviction policy in effect.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Fetch a document, promoting it to most-recently-used.
    pub fn get(&self, layer: Layer, id: &str) -> Option<Arc<Artifact>> {
        if self.policy == CachePolicy::Disabled {
            return None;
        }
        let key = (layer, id.to_string());
        let mut inner = self.lock();
        match inner.map.get(&key).cloned() {
            Some(doc) => {
                inner.hits += 1;
                if let CachePolicy::Lru { .. } = self.policy {
                    inner.order.retain(|k| *k != key);
                    inner.order.push_back(key);
                }
                Some(doc)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a document, evicting the LRU entry if at capacity.
    /// Returns the evicted key if eviction occurred.
    pub fn put(&self, layer: Layer, id: &str, doc: Arc<Artifact>) -> Option<CacheKey> {
        let capacity = match self.policy {
            CachePolicy::Disabled => return None,
            CachePolicy::Unbounded => None,
            CachePolicy::Lru { capacity } => Some(capacity),
        };
        if capacity == Some(0) {
            return None;
        }

        let key = (layer, id.to_string());
        let mut inner = self.lock();

        let evicted = match capacity {
            Some(capacity) => {
                if inner.map.contains_key(&key) {
                    inner.order.retain(|k| *k != key);
                    None
                } else if inner.map.len() >= capacity {
                    Self::evict_lru(&mut inner)
                } else {
                    None
                }
            }
            None => None,
        };

        if capacity.is_some() {
            inner.order.push_back(key.clone());
        }
        inner.map.insert(key, doc);

        if let Some((layer, id)) = &evicted {
            tracing::debug!(layer = layer.number(), id = %id, "Evicted cached document");
        }
        evicted
    }

    /// Drop a single entry.
    pub fn invalidate(&self, layer: Layer, id: &str) {
        let key = (layer, id.to_string());
        let mut inner = self.lock();
        if inner.map.remove(&key).is_some() {
            inner.order.retain(|k| *k != key);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    /// Entry count plus hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    fn evict_lru(inner: &mut CacheInner) -> Option<CacheKey> {
        let lru = inner.order.pop_front()?;
        inner.map.remove(&lru);
        Some(lru)
    }

    // Poisoning is ignored: entries are derived data.
    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Arc<Artifact> {
        let text = format!("metadata:\n  id: {}\n", id);
        Arc::new(Artifact::parse(Layer::Guidance, &text).unwrap())
    }

    fn lru(capacity: usize) -> DocumentCache {
        DocumentCache::new(CachePolicy::Lru { capacity })
    }

    #[test]
    fn test_put_and_get() {
        let cache = lru(10);
        assert!(cache.put(Layer::Guidance, "a", doc("a")).is_none());
        let hit = cache.get(Layer::Guidance, "a").unwrap();
        assert_eq!(hit.id(), "a");
        assert!(cache.get(Layer::Controls, "a").is_none());
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = lru(3);
        for id in ["a", "b", "c"] {
            cache.put(Layer::Guidance, id, doc(id));
        }
        assert_eq!(cache.len(), 3);

        let evicted = cache.put(Layer::Guidance, "d", doc("d"));
        assert_eq!(evicted, Some((Layer::Guidance, "a".to_string())));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(Layer::Guidance, "a").is_none());
    }

    #[test]
    fn test_get_promotes_to_mru() {
        let cache = lru(3);
        for id in ["a", "b", "c"] {
            cache.put(Layer::Guidance, id, doc(id));
        }
        cache.get(Layer::Guidance, "a");

        let evicted = cache.put(Layer::Guidance, "d", doc("d"));
        assert_eq!(evicted, Some((Layer::Guidance, "b".to_string())));
        assert!(cache.get(Layer::Guidance, "a").is_some());
    }

    #[test]
    fn test_put_same_key_updates() {
        let cache = lru(2);
        cache.put(Layer::Guidance, "a", doc("a"));
        cache.put(Layer::Guidance, "b", doc("b"));
        assert!(cache.put(Layer::Guidance, "a", doc("a")).is_none());
        assert_eq!(cache.len(), 2);
        // "a" was refreshed, so "b" goes first
        let evicted = cache.put(Layer::Guidance, "c", doc("c"));
        assert_eq!(evicted, Some((Layer::Guidance, "b".to_string())));
    }

    #[test]
    fn test_disabled_never_stores() {
        let cache = DocumentCache::new(CachePolicy::Disabled);
        cache.put(Layer::Policy, "p", doc("p"));
        assert!(cache.is_empty());
        assert!(cache.get(Layer::Policy, "p").is_none());
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let cache = DocumentCache::new(CachePolicy::Unbounded);
        for i in 0..500 {
            let id = format!("doc-{}", i);
            assert!(cache.put(Layer::Evaluation, &id, doc(&id)).is_none());
        }
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = lru(10);
        cache.put(Layer::Guidance, "a", doc("a"));
        cache.put(Layer::Guidance, "b", doc("b"));
        cache.invalidate(Layer::Guidance, "a");
        assert!(cache.get(Layer::Guidance, "a").is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
