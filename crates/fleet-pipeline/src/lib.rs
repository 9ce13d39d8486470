//! ---
//! fleet_section: "06-consumption"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry ingestion and alert-processing pipelines."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Consumption side of the bus: the telemetry ingestion pipeline and the
//! alert-processing pipeline.
//!
//! Both consume at-least-once deliveries and decide per message between
//! ack (retire) and nack (redeliver). Malformed payloads are poison and
//! always acked after logging; collaborator outages are retryable and
//! nacked.

pub mod alerts;
pub mod metrics;
pub mod rules;
pub mod telemetry;

pub use alerts::AlertPipeline;
pub use metrics::{new_registry, PipelineMetrics, SharedRegistry};
pub use rules::{default_rules, AlertRule, LoadRule, SignalRule};
pub use telemetry::{Disposition, TelemetryPipeline};
