//! ---
//! fleet_section: "05-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Synthetic telemetry generation and fleet scheduling."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use fleet_bus::BusPublisher;
use fleet_common::SimulatorConfig;
use fleet_model::TelemetrySample;

use crate::aggregator::{AggregatorStats, BatchAggregator};
use crate::generator::{synthesize, DeviceProfile};

/// Fleet-wide counters reported after shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FleetStats {
    /// Samples accepted into the intake queue across all devices.
    pub accepted: u64,
    /// Aggregator-side counters.
    pub aggregator: AggregatorStats,
}

/// Running simulation: one timer-multiplexed tokio task per device plus the
/// aggregator task.
///
/// Shutdown is a broadcast watch signal. A device task blocked on a full
/// intake queue races the signal in the same `select!`, so a saturated
/// queue never delays shutdown. [`FleetRunner::shutdown`] joins every
/// device task first; their senders drop, the queue closes, and the
/// aggregator performs its final flush before reporting stats.
pub struct FleetRunner {
    shutdown: watch::Sender<bool>,
    devices: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<AggregatorStats>,
    accepted: Arc<AtomicU64>,
}

impl FleetRunner {
    /// Build the fleet and spawn every task.
    pub fn spawn(config: &SimulatorConfig, publisher: Arc<dyn BusPublisher>) -> Self {
        let mut master_rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let profiles = DeviceProfile::draw_fleet(config.device_count, &mut master_rng);
        info!(devices = profiles.len(), "fleet initialised");

        let (intake_tx, intake_rx) = mpsc::channel::<TelemetrySample>(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accepted = Arc::new(AtomicU64::new(0));

        let aggregator = BatchAggregator::new(config, publisher);
        let aggregator_handle = tokio::spawn(aggregator.run(intake_rx));

        let devices = profiles
            .into_iter()
            .map(|profile| {
                let task = DeviceTask {
                    profile,
                    tick_interval: config.tick_interval,
                    startup_jitter_ms: config.startup_jitter_ms,
                    tick_jitter_ms: config.tick_jitter_ms,
                    intake: intake_tx.clone(),
                    shutdown: shutdown_rx.clone(),
                    accepted: Arc::clone(&accepted),
                    rng: StdRng::seed_from_u64(master_rng.gen()),
                };
                tokio::spawn(task.run())
            })
            .collect();
        drop(intake_tx);

        Self {
            shutdown: shutdown_tx,
            devices,
            aggregator: aggregator_handle,
            accepted,
        }
    }

    /// Samples accepted into the intake queue so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Broadcast the shutdown signal, join every device task, then wait for
    /// the aggregator's final flush.
    pub async fn shutdown(self) -> FleetStats {
        info!("shutting down fleet");
        let _ = self.shutdown.send(true);
        for handle in self.devices {
            if let Err(err) = handle.await {
                warn!(error = %err, "device task join failure");
            }
        }
        let aggregator = match self.aggregator.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "aggregator join failure");
                AggregatorStats::default()
            }
        };
        let stats = FleetStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            aggregator,
        };
        info!(
            accepted = stats.accepted,
            flushed = stats.aggregator.flushed,
            published = stats.aggregator.published,
            "fleet stopped"
        );
        stats
    }
}

struct DeviceTask {
    profile: DeviceProfile,
    tick_interval: Duration,
    startup_jitter_ms: u64,
    tick_jitter_ms: u64,
    intake: mpsc::Sender<TelemetrySample>,
    shutdown: watch::Receiver<bool>,
    accepted: Arc<AtomicU64>,
    rng: StdRng,
}

impl DeviceTask {
    async fn run(mut self) {
        // spread the herd over the first second
        let startup_jitter =
            Duration::from_millis(self.rng.gen_range(0..=self.startup_jitter_ms));
        tokio::select! {
            _ = tokio::time::sleep(startup_jitter) => {}
            _ = self.shutdown.changed() => return,
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first firing is immediate; the cadence starts after it

        let mut last_at = Utc::now();
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return,
                _ = ticker.tick() => {}
            }

            if self.tick_jitter_ms > 0 {
                let jitter = Duration::from_millis(self.rng.gen_range(0..=self.tick_jitter_ms));
                tokio::time::sleep(jitter).await;
            }

            // per-device capture timestamps never go backwards
            let at = Utc::now().max(last_at);
            last_at = at;
            let sample = synthesize(&self.profile, &mut self.rng, at);

            tokio::select! {
                sent = self.intake.send(sample) => {
                    if sent.is_err() {
                        return; // aggregator gone
                    }
                    self.accepted.fetch_add(1, Ordering::Relaxed);
                }
                _ = self.shutdown.changed() => return,
            }
        }
    }
}
