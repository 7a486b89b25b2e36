//! Process-lifetime memoization of detection results.

use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;

/// Thread-safe map from cache key to the last computed value.
///
/// Entries never expire; they are replaced when a caller forces
/// recomputation. Failed computations are not stored. Concurrent misses for
/// the same key each run their computation and the last one to finish wins.
///
/// Values are handed out by clone, so callers that want to share a large
/// result should store it behind an `Arc`.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ResultCache<V> {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a cached value.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&self, key: &str, value: V) {
        self.entries.lock().insert(key.to_string(), value);
    }

    /// Removes the value under `key`.
    pub fn invalidate(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key)
    }

    /// Clears all entries from the cache
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// result. With `force` set the cached value is ignored and replaced.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, force: bool, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if !force {
            if let Some(value) = self.get(key) {
                tracing::trace!(key, "cache hit");
                return Ok(value);
            }
        }

        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DetectError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cache_basic_operations() {
        let cache = ResultCache::new();
        cache.insert("sdk", 1);
        assert_eq!(cache.get("sdk"), Some(1));
        assert_eq!(cache.get("visualstudio"), None);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.invalidate("sdk"), Some(1));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_compute_memoizes() {
        let cache = ResultCache::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("result".to_string()))
        };

        let first = cache.get_or_compute("sdk", false, compute).await.unwrap();
        let second = cache.get_or_compute("sdk", false, compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_force_recomputes_and_overwrites() {
        let cache = ResultCache::new();
        cache.get_or_compute("k", false, || async { Ok(1) }).await.unwrap();

        let forced = cache.get_or_compute("k", true, || async { Ok(2) }).await.unwrap();
        assert_eq!(forced, 2);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: ResultCache<u32> = ResultCache::new();
        let result = cache
            .get_or_compute("k", false, || async {
                Err(DetectError::invalid_argument("nope"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get("k").is_none());

        let value = cache.get_or_compute("k", false, || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
