//! Hot-cache accelerator in front of the durable store.
//!
//! Two layers: an in-process [`DashMap`] that always exists, and an
//! optional Redis layer (the `redis` feature) for cross-process sharing.
//! Every entry carries an explicit expiry; reads lazily discard entries
//! that have aged out rather than running a background sweep.

use crate::metrics;
use crate::redis_manager::RedisManager;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// General-purpose TTL cache used for bundle responses and hot deal reads.
#[derive(Clone)]
pub struct HotCache {
    local: Arc<DashMap<String, Entry>>,
    redis: Option<Arc<tokio::sync::Mutex<RedisManager>>>,
    max_entries: usize,
}

impl HotCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            redis: None,
            max_entries,
        }
    }

    pub fn with_redis(mut self, redis: RedisManager) -> Self {
        self.redis = Some(Arc::new(tokio::sync::Mutex::new(redis)));
        self
    }

    fn maybe_evict(&self) {
        if self.local.len() <= self.max_entries {
            return;
        }
        let to_remove = self.local.len() - self.max_entries;
        let mut removed = 0;
        for entry in self.local.iter() {
            if removed >= to_remove {
                break;
            }
            self.local.remove(entry.key());
            removed += 1;
        }
    }

    /// Serializes `value` with bincode and stores it under `key` for
    /// `ttl`, in both layers when Redis is configured.
    pub async fn set<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.local.insert(
            key.to_string(),
            Entry {
                bytes: bytes.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.maybe_evict();

        if let Some(redis) = &self.redis {
            let mut guard = redis.lock().await;
            if let Err(e) = guard.set_bytes(key, &bytes, ttl.as_secs()).await {
                log::debug!("hot cache redis write skipped for {}: {}", key, e);
            }
        }
        Ok(())
    }

    /// Reads and deserializes the value at `key`, checking the local layer
    /// first and falling back to Redis. Expired local entries are treated
    /// as misses and removed lazily.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.local.get(key) {
            if entry.expires_at > Instant::now() {
                metrics::increment_cache_hit("hot_cache");
                return bincode::deserialize(&entry.bytes).ok();
            }
        }
        self.local.remove(key);

        if let Some(redis) = &self.redis {
            let mut guard = redis.lock().await;
            if let Ok(Some(bytes)) = guard.get_bytes(key).await {
                metrics::increment_cache_hit("hot_cache_redis");
                return bincode::deserialize(&bytes).ok();
            }
        }
        metrics::increment_cache_miss("hot_cache");
        None
    }

    /// Returns every non-expired value whose key starts with `prefix`,
    /// checking the local layer first and then Redis (if configured).
    /// Used by `bundles_for_user` to reconstruct a response from the hot
    /// cache before falling back to the durable store.
    pub async fn scan_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Vec<T> {
        let mut out = Vec::new();
        let now = Instant::now();
        for entry in self.local.iter() {
            if entry.key().starts_with(prefix) && entry.expires_at > now {
                if let Ok(value) = bincode::deserialize::<T>(&entry.bytes) {
                    out.push(value);
                }
            }
        }
        if !out.is_empty() {
            return out;
        }

        if let Some(redis) = &self.redis {
            let mut guard = redis.lock().await;
            if let Ok(keys) = guard.keys(&format!("{}*", prefix)).await {
                for key in keys {
                    if let Ok(Some(bytes)) = guard.get_bytes(&key).await {
                        if let Ok(value) = bincode::deserialize::<T>(&bytes) {
                            out.push(value);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = HotCache::new(100);
        cache
            .set("k1", &vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<Vec<i32>> = cache.get("k1").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = HotCache::new(100);
        cache
            .set("k1", &42i32, Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let value: Option<i32> = cache.get("k1").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn evicts_when_over_capacity() {
        let cache = HotCache::new(2);
        for i in 0..10 {
            cache
                .set(&format!("k{i}"), &i, Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert!(cache.len() <= 3);
    }
}
