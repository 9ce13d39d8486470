//! ---
//! fleet_section: "05-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Synthetic telemetry generation and fleet scheduling."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use fleet_bus::{BusPublisher, TOPIC_TELEMETRY};
use fleet_common::SimulatorConfig;
use fleet_model::TelemetrySample;

/// Counters reported by the aggregator when its intake queue closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Samples handed to the publish step, including the final flush.
    pub flushed: u64,
    /// Samples the bus accepted.
    pub published: u64,
    /// Number of flush operations performed.
    pub flushes: u64,
}

/// Single owner of the outgoing batch buffer.
///
/// All appends happen through one consumption point draining the intake
/// queue; no other task touches the buffer. Two flush triggers race: buffer
/// length reaching `batch_size`, and the flush ticker bounding worst-case
/// publish latency under low traffic. When the queue closes (every device
/// task has exited) the remaining partial buffer is flushed before the
/// stats are returned, so nothing accepted into the queue is dropped.
pub struct BatchAggregator {
    batch_size: usize,
    flush_interval: std::time::Duration,
    publisher: Arc<dyn BusPublisher>,
    stats: AggregatorStats,
}

impl BatchAggregator {
    /// Build an aggregator publishing to the telemetry topic.
    pub fn new(config: &SimulatorConfig, publisher: Arc<dyn BusPublisher>) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            publisher,
            stats: AggregatorStats::default(),
        }
    }

    /// Drain the intake queue until every sender is gone.
    pub async fn run(mut self, mut intake: mpsc::Receiver<TelemetrySample>) -> AggregatorStats {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // the immediate first tick is not a flush

        let mut buffer: Vec<TelemetrySample> = Vec::with_capacity(self.batch_size);
        loop {
            tokio::select! {
                received = intake.recv() => match received {
                    Some(sample) => {
                        buffer.push(sample);
                        if buffer.len() >= self.batch_size {
                            self.flush(&mut buffer).await;
                        }
                    }
                    None => {
                        self.flush(&mut buffer).await;
                        debug!(
                            flushed = self.stats.flushed,
                            published = self.stats.published,
                            "intake queue closed; aggregator exiting"
                        );
                        return self.stats;
                    }
                },
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }
    }

    /// Serialize and publish every buffered sample, keyed by device id.
    ///
    /// Best-effort: a failed sample is logged and lost, the rest of the
    /// batch still goes out.
    async fn flush(&mut self, buffer: &mut Vec<TelemetrySample>) {
        if buffer.is_empty() {
            return;
        }
        debug!(batch = buffer.len(), "publishing telemetry batch");
        self.stats.flushes += 1;
        for sample in buffer.drain(..) {
            self.stats.flushed += 1;
            let payload = match serde_json::to_vec(&sample) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(device = %sample.device_id, error = %err, "failed to serialize sample");
                    continue;
                }
            };
            match self
                .publisher
                .publish(TOPIC_TELEMETRY, payload, &sample.device_id)
                .await
            {
                Ok(()) => self.stats.published += 1,
                Err(err) => {
                    warn!(device = %sample.device_id, error = %err, "publish failed; sample lost");
                }
            }
        }
    }
}
