//! ---
//! fleet_section: "04-persistence"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Storage, cache, and observability-sink contracts."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Collaborator contracts for durable storage, the key-value cache, and the
//! observability sink.
//!
//! Schema design and engine internals belong to the collaborators; this
//! crate fixes the operations the pipelines need and ships in-memory
//! implementations for tests and the single-process daemon. Inserts must
//! tolerate repetition: redelivered messages produce duplicate rows by
//! design, never constraint violations.

pub mod cache;
pub mod memory;
pub mod sink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by storage collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing service is unreachable or rejected the operation.
    /// Retryable: consumers nack the message for broker redelivery.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A cached blob failed to decode. The read path treats this the same
    /// as a cache miss.
    #[error("cache blob corrupt: {0}")]
    CorruptBlob(#[from] serde_json::Error),
}

/// One stored value with its capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// The recorded value.
    pub value: i64,
    /// Capture timestamp as unix seconds.
    pub time: i64,
}

/// Aggregate over a range of stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Mean of the values in range, zero when empty.
    pub average: i64,
    /// Number of values in range.
    pub count: u64,
}

/// Durable relational store contract.
///
/// `kind` carries either a metric kind or an alert kind; the store does not
/// distinguish them.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Insert one row. Repeated inserts of identical rows are legal.
    async fn insert(
        &self,
        device_id: &str,
        kind: &str,
        value: i64,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Rows for one device/kind in `[from, to]`, ordered by time ascending.
    async fn range(
        &self,
        device_id: &str,
        kind: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricPoint>>;

    /// Average and count for one device/kind in `[from, to]`.
    async fn aggregate(
        &self,
        device_id: &str,
        kind: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AggregateStats>;
}

/// Key-value cache contract. Failures are tolerated everywhere: the read
/// path falls back to the store, the write path drops the blob.
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Fetch a blob, `None` on miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a blob with a time-to-live in seconds.
    async fn set(&self, key: &str, blob: Vec<u8>, ttl_secs: u64) -> Result<()>;
}

pub use cache::CachedMetricReader;
pub use memory::{MemoryCache, MemoryStore};
pub use sink::{emit_optional, EventSink, TracingSink};
