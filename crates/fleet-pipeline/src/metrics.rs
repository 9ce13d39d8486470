//! ---
//! fleet_section: "06-consumption"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry ingestion and alert-processing pipelines."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use prometheus::{IntCounter, Opts, Registry};

/// Shared registry type used across the daemon.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Counters recorded by the consumption pipelines.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: SharedRegistry,
    processed_total: IntCounter,
    persisted_rows_total: IntCounter,
    decode_failures_total: IntCounter,
    nacks_total: IntCounter,
    alerts_emitted_total: IntCounter,
}

impl PipelineMetrics {
    /// Register the pipeline counters on the given registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let processed_total = IntCounter::with_opts(Opts::new(
            "fleet_pipeline_processed_total",
            "Messages fully processed and acked by the ingestion pipeline",
        ))?;
        registry.register(Box::new(processed_total.clone()))?;

        let persisted_rows_total = IntCounter::with_opts(Opts::new(
            "fleet_pipeline_persisted_rows_total",
            "Metric rows written to the store",
        ))?;
        registry.register(Box::new(persisted_rows_total.clone()))?;

        let decode_failures_total = IntCounter::with_opts(Opts::new(
            "fleet_pipeline_decode_failures_total",
            "Payloads dropped as undecodable poison",
        ))?;
        registry.register(Box::new(decode_failures_total.clone()))?;

        let nacks_total = IntCounter::with_opts(Opts::new(
            "fleet_pipeline_nacks_total",
            "Messages returned to the broker for redelivery",
        ))?;
        registry.register(Box::new(nacks_total.clone()))?;

        let alerts_emitted_total = IntCounter::with_opts(Opts::new(
            "fleet_pipeline_alerts_emitted_total",
            "Alert occurrences republished to the alerts topic",
        ))?;
        registry.register(Box::new(alerts_emitted_total.clone()))?;

        Ok(Self {
            registry,
            processed_total,
            persisted_rows_total,
            decode_failures_total,
            nacks_total,
            alerts_emitted_total,
        })
    }

    /// Handle to the underlying registry.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Record one fully processed message.
    pub fn inc_processed(&self) {
        self.processed_total.inc();
    }

    /// Record persisted rows.
    pub fn add_persisted_rows(&self, rows: u64) {
        self.persisted_rows_total.inc_by(rows);
    }

    /// Record one undecodable payload.
    pub fn inc_decode_failure(&self) {
        self.decode_failures_total.inc();
    }

    /// Record one nacked message.
    pub fn inc_nack(&self) {
        self.nacks_total.inc();
    }

    /// Record one emitted alert occurrence.
    pub fn inc_alert_emitted(&self) {
        self.alerts_emitted_total.inc();
    }
}
