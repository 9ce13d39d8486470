//! ---
//! fleet_section: "03-messaging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Pub/sub bus contract and in-memory broker."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Bus contract consumed by the simulator and the pipelines.
//!
//! Broker internals (persistence, retry/backoff, partition assignment) are
//! collaborator-owned; this crate only fixes the narrow interface: publish
//! with a partition key, subscribe with a group name, per-message ack/nack
//! where nack requests broker-driven redelivery.

pub mod memory;

use async_trait::async_trait;

/// Topic carrying raw telemetry samples from the fleet.
pub const TOPIC_TELEMETRY: &str = "fleet/telemetry";
/// Topic carrying alert events derived from telemetry.
pub const TOPIC_ALERTS: &str = "fleet/alerts";

/// Shared result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors surfaced by bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The broker refused or failed a publish. Producer-side telemetry is
    /// best-effort: callers log and continue with the rest of the batch.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish {
        /// Topic that rejected the message.
        topic: String,
        /// Broker-provided failure description.
        reason: String,
    },
    /// A subscription already exists for an exclusive group.
    #[error("group '{0}' is already subscribed exclusively")]
    GroupBusy(String),
    /// The subscription's stream has been closed by the broker.
    #[error("subscription closed")]
    Closed,
}

/// How messages are distributed among consumers sharing a group name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Work-queue semantics: each message goes to one consumer in the group.
    Shared,
    /// Single consumer; a second subscribe with the same group fails.
    Exclusive,
}

/// One message presented to a consumer.
///
/// Acknowledgement is consuming: exactly one of [`Delivery::ack`] or
/// [`Delivery::nack`] is called per delivery. Dropping a delivery without
/// acknowledging it loses the message (in-memory broker only; real brokers
/// redeliver on ack timeout).
#[derive(Debug)]
pub struct Delivery {
    topic: &'static str,
    partition_key: String,
    payload: Vec<u8>,
    attempts: u32,
    redeliver: Option<tokio::sync::mpsc::UnboundedSender<memory::Envelope>>,
}

impl Delivery {
    /// Topic the message arrived on.
    pub fn topic(&self) -> &str {
        self.topic
    }

    /// Partition key the producer published with.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Raw message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of times this message has been presented, starting at 1.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Positively acknowledge: the broker retires the message.
    pub fn ack(self) {}

    /// Negatively acknowledge: the broker requeues the message for
    /// redelivery with an incremented attempt count.
    pub fn nack(mut self) {
        if let Some(redeliver) = self.redeliver.take() {
            let envelope = memory::Envelope {
                partition_key: std::mem::take(&mut self.partition_key),
                payload: std::mem::take(&mut self.payload),
                attempts: self.attempts + 1,
            };
            if redeliver.send(envelope).is_err() {
                tracing::warn!(topic = self.topic, "redelivery queue closed; message lost");
            }
        }
    }
}

/// Producer half of the bus contract.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Publish one payload. Messages sharing a partition key are delivered
    /// in publish order to any single-partition consumer; no other ordering
    /// is guaranteed.
    async fn publish(&self, topic: &'static str, payload: Vec<u8>, partition_key: &str)
        -> Result<()>;
}

/// Consumer half of the bus contract.
#[async_trait]
pub trait BusSubscriber: Send + Sync {
    /// Suspend until the next message is available.
    async fn receive(&self) -> Result<Delivery>;
}
