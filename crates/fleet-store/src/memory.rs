//! ---
//! fleet_section: "04-persistence"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Storage, cache, and observability-sink contracts."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{AggregateStats, BlobCache, MetricPoint, MetricStore, Result};

#[derive(Debug, Clone)]
struct Row {
    device_id: String,
    kind: String,
    value: i64,
    at: DateTime<Utc>,
}

/// Append-only in-memory store for tests and the standalone daemon.
///
/// Mirrors the durable store's shape: rows are never deduplicated, range
/// queries return time-ascending results.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<Row>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total row count across all devices and kinds.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Row count for one kind, across devices.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.rows.lock().iter().filter(|row| row.kind == kind).count()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn insert(
        &self,
        device_id: &str,
        kind: &str,
        value: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.rows.lock().push(Row {
            device_id: device_id.to_owned(),
            kind: kind.to_owned(),
            value,
            at,
        });
        Ok(())
    }

    async fn range(
        &self,
        device_id: &str,
        kind: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricPoint>> {
        let mut points: Vec<(DateTime<Utc>, MetricPoint)> = self
            .rows
            .lock()
            .iter()
            .filter(|row| {
                row.device_id == device_id && row.kind == kind && row.at >= from && row.at <= to
            })
            .map(|row| {
                (
                    row.at,
                    MetricPoint {
                        value: row.value,
                        time: row.at.timestamp(),
                    },
                )
            })
            .collect();
        points.sort_by_key(|(at, _)| *at);
        Ok(points.into_iter().map(|(_, point)| point).collect())
    }

    async fn aggregate(
        &self,
        device_id: &str,
        kind: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AggregateStats> {
        let points = self.range(device_id, kind, from, to).await?;
        if points.is_empty() {
            return Ok(AggregateStats::default());
        }
        let sum: i64 = points.iter().map(|point| point.value).sum();
        Ok(AggregateStats {
            average: sum / points.len() as i64,
            count: points.len() as u64,
        })
    }
}

struct CacheEntry {
    blob: Vec<u8>,
    expires_at: Instant,
}

/// In-memory TTL cache for tests and the standalone daemon.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.blob.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, blob: Vec<u8>, ttl_secs: u64) -> Result<()> {
        self.entries.lock().insert(
            key.to_owned(),
            CacheEntry {
                blob,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }
}
