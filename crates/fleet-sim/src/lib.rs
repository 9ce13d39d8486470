//! ---
//! fleet_section: "05-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Synthetic telemetry generation and fleet scheduling."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Concurrent simulation-and-batching engine.
//!
//! One lightweight tokio task per simulated device feeds a bounded intake
//! queue; a single aggregator task owns the outgoing buffer and publishes
//! size- or time-triggered batches keyed by device id.

pub mod aggregator;
pub mod generator;
pub mod scheduler;

pub use aggregator::{AggregatorStats, BatchAggregator};
pub use generator::{synthesize, DeviceProfile};
pub use scheduler::{FleetRunner, FleetStats};
