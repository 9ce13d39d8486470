//! ---
//! fleet_section: "04-persistence"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Storage, cache, and observability-sink contracts."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{BlobCache, MetricPoint, MetricStore, Result};

/// Read-through metric reader combining the durable store with the cache.
///
/// Reads prefer the cache; a miss or any cache failure falls back to the
/// store and never fails the read path. Store results are written back to
/// the cache best-effort.
pub struct CachedMetricReader {
    store: Arc<dyn MetricStore>,
    cache: Arc<dyn BlobCache>,
    ttl_secs: u64,
}

impl CachedMetricReader {
    /// Wrap a store and cache with the given write-back TTL.
    pub fn new(store: Arc<dyn MetricStore>, cache: Arc<dyn BlobCache>, ttl_secs: u64) -> Self {
        Self {
            store,
            cache,
            ttl_secs,
        }
    }

    /// Range query with read-through caching.
    pub async fn range(
        &self,
        device_id: &str,
        kind: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricPoint>> {
        let key = Self::cache_key(device_id, kind, from, to);

        match self.cache.get(&key).await {
            Ok(Some(blob)) => match serde_json::from_slice::<Vec<MetricPoint>>(&blob) {
                Ok(points) => return Ok(points),
                Err(err) => debug!(%key, error = %err, "corrupt cache blob; falling back to store"),
            },
            Ok(None) => {}
            Err(err) => debug!(%key, error = %err, "cache read failed; falling back to store"),
        }

        let points = self.store.range(device_id, kind, from, to).await?;

        if let Ok(blob) = serde_json::to_vec(&points) {
            if let Err(err) = self.cache.set(&key, blob, self.ttl_secs).await {
                debug!(%key, error = %err, "cache write-back failed");
            }
        }
        Ok(points)
    }

    fn cache_key(device_id: &str, kind: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        format!(
            "metrics:{}:{}:{}:{}",
            device_id,
            kind,
            from.timestamp(),
            to.timestamp()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCache, MemoryStore, StoreError};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    struct BrokenCache;

    #[async_trait]
    impl BlobCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(StoreError::Unavailable("cache down".into()))
        }

        async fn set(&self, _key: &str, _blob: Vec<u8>, _ttl_secs: u64) -> Result<()> {
            Err(StoreError::Unavailable("cache down".into()))
        }
    }

    #[tokio::test]
    async fn miss_falls_back_to_store_and_populates_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        store.insert("DEV-1", "load", 42, at(100)).await.unwrap();

        let reader = CachedMetricReader::new(store.clone(), cache.clone(), 60);
        let points = reader.range("DEV-1", "load", at(0), at(200)).await.unwrap();
        assert_eq!(points, vec![MetricPoint { value: 42, time: 100 }]);

        // second read is served from cache even after the store changes
        store.insert("DEV-1", "load", 43, at(150)).await.unwrap();
        let cached = reader.range("DEV-1", "load", at(0), at(200)).await.unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn cache_failure_never_fails_the_read_path() {
        let store = Arc::new(MemoryStore::new());
        store.insert("DEV-1", "load", 7, at(100)).await.unwrap();

        let reader = CachedMetricReader::new(store, Arc::new(BrokenCache), 60);
        let points = reader.range("DEV-1", "load", at(0), at(200)).await.unwrap();
        assert_eq!(points.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_blob_is_treated_as_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        store.insert("DEV-1", "load", 7, at(100)).await.unwrap();

        let key = CachedMetricReader::cache_key("DEV-1", "load", at(0), at(200));
        cache.set(&key, b"not json".to_vec(), 60).await.unwrap();

        let reader = CachedMetricReader::new(store, cache, 60);
        let points = reader.range("DEV-1", "load", at(0), at(200)).await.unwrap();
        assert_eq!(points.len(), 1);
    }
}
