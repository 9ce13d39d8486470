//! ---
//! fleet_section: "02-data-model"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry schema and alert/metric taxonomy."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Data model shared by the simulator and the consumption pipelines.
//!
//! Wire payloads are JSON; unknown fields are ignored and optional fields
//! are omitted rather than serialized as null.

pub mod alert;
pub mod metric;
pub mod sample;

/// Shared result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while decoding wire payloads.
///
/// Every variant is non-retryable: a payload that fails to decode will fail
/// identically on redelivery, so consumers acknowledge and drop it.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The payload was not valid JSON for the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The payload decoded but carried an empty entity identifier.
    #[error("payload missing entity id")]
    MissingEntity,
}

pub use alert::{decode_alert, AlertKind, AlertOccurrence, Severity};
pub use metric::MetricKind;
pub use sample::{decode_sample, TelemetrySample};
