//! TTL cache for upstream fetches shared across runs

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Concurrent map whose entries expire `ttl` after insertion
pub struct TtlCache<K, V> {
    entries: DashMap<K, (Instant, V)>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Live value for `key`; expired entries are evicted on read
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            let (inserted, value) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(value.clone());
            }
        }

        // Read guard must be dropped before removing from the same shard
        self.entries
            .remove_if(key, |_, (inserted, _)| inserted.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Return the cached value or run `fetch` and cache its success.
    ///
    /// Failures are not cached. Two concurrent misses may both fetch.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("AAPL".to_string(), 1);
        assert_eq!(cache.get(&"AAPL".to_string()), Some(1));
        assert_eq!(cache.get(&"MSFT".to_string()), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert("AAPL", 1);
        assert_eq!(cache.get(&"AAPL"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_runs_once_while_fresh() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value: Result<u32, String> = cache
                .get_or_try_insert_with("AAPL", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value.unwrap(), 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));

        let first: Result<u32, String> = cache
            .get_or_try_insert_with("AAPL", || async { Err("upstream down".to_string()) })
            .await;
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<u32, String> = cache.get_or_try_insert_with("AAPL", || async { Ok(7) }).await;
        assert_eq!(second.unwrap(), 7);

        cache.clear();
        assert!(cache.is_empty());
    }
}
