//! ---
//! fleet_section: "02-data-model"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry schema and alert/metric taxonomy."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::metric::MetricKind;
use crate::{ModelError, Result};

/// One telemetry snapshot for one device at one point in time.
///
/// The generator guarantees `captured_at` is non-decreasing per device; the
/// model does not otherwise enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Stable device identifier, non-empty on any valid sample.
    #[serde(rename = "entityId")]
    pub device_id: String,
    /// Capture timestamp. Accepts RFC-3339 or integer epoch seconds on the
    /// wire; missing timestamps are filled with "now" at decode.
    #[serde(
        rename = "capturedAt",
        default = "Utc::now",
        deserialize_with = "flexible_timestamp"
    )]
    pub captured_at: DateTime<Utc>,
    /// Flat mapping of metric-name strings to 64-bit values.
    #[serde(default)]
    pub measurements: BTreeMap<String, i64>,
}

impl TelemetrySample {
    /// Construct an empty sample for the given device.
    pub fn new(device_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            captured_at,
            measurements: BTreeMap::new(),
        }
    }

    /// Value of a recognized metric, if present on this sample.
    pub fn metric(&self, kind: MetricKind) -> Option<i64> {
        self.measurements.get(kind.as_str()).copied()
    }

    /// Record a recognized metric value.
    pub fn set_metric(&mut self, kind: MetricKind, value: i64) {
        self.measurements.insert(kind.as_str().to_owned(), value);
    }

    /// Minimum across the tracked signal channels present on this sample.
    pub fn weakest_signal(&self) -> Option<i64> {
        MetricKind::SIGNALS
            .iter()
            .filter_map(|kind| self.metric(*kind))
            .min()
    }
}

/// Decode a telemetry wire payload, rejecting samples without an entity id.
pub fn decode_sample(payload: &[u8]) -> Result<TelemetrySample> {
    let sample: TelemetrySample = serde_json::from_slice(payload)?;
    if sample.device_id.trim().is_empty() {
        return Err(ModelError::MissingEntity);
    }
    Ok(sample)
}

/// Accepts RFC-3339 strings or integer epoch seconds.
fn flexible_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Epoch(i64),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Epoch(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("epoch seconds out of range")),
        Wire::Text(text) => text
            .parse::<DateTime<Utc>>()
            .map_err(serde::de::Error::custom),
    }
}
