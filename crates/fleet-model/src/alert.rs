//! ---
//! fleet_section: "02-data-model"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry schema and alert/metric taxonomy."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{ModelError, Result};

/// Closed enumeration of alert types derived from telemetry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AlertKind {
    /// Load metric exceeded its threshold.
    HighLoad,
    /// The weakest tracked signal channel fell below its threshold.
    WeakSignal,
}

impl AlertKind {
    /// Stable string name used both on the wire and as the storage kind.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Severity classification for an occurrence.
///
/// Informational only: used when mirroring alerts to an observability sink,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Threshold crossed, within tolerable range.
    Warning,
    /// Rule-specific secondary threshold crossed.
    Critical,
}

/// One instance of an alert condition being met.
///
/// An event, not a deduplicated entity: duplicates under redelivery are
/// legal and expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOccurrence {
    /// Device the alert was observed on.
    #[serde(rename = "entityId")]
    pub device_id: String,
    /// Alert classification.
    #[serde(rename = "alertKind")]
    pub kind: AlertKind,
    /// The metric value that tripped the rule.
    pub value: i64,
    /// Capture timestamp of the originating sample.
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl AlertOccurrence {
    /// Construct an occurrence for the given device and kind.
    pub fn new(
        device_id: impl Into<String>,
        kind: AlertKind,
        value: i64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            value,
            captured_at,
        }
    }

    /// Classify this occurrence against its rule-specific critical threshold.
    pub fn severity(&self) -> Severity {
        let critical = match self.kind {
            AlertKind::HighLoad => self.value >= 80,
            AlertKind::WeakSignal => self.value <= -110,
        };
        if critical {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Decode an alert-event wire payload.
///
/// One canonical strict schema is used on both ends of the alert topic.
pub fn decode_alert(payload: &[u8]) -> Result<AlertOccurrence> {
    let alert: AlertOccurrence = serde_json::from_slice(payload)?;
    if alert.device_id.trim().is_empty() {
        return Err(ModelError::MissingEntity);
    }
    Ok(alert)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_uses_canonical_field_names() {
        let occurrence = AlertOccurrence::new("DEV-7", AlertKind::HighLoad, 75, Utc::now());
        let json = serde_json::to_value(&occurrence).unwrap();
        assert_eq!(json["entityId"], "DEV-7");
        assert_eq!(json["alertKind"], "high-load");
        assert_eq!(json["value"], 75);

        let bytes = serde_json::to_vec(&occurrence).unwrap();
        let decoded = decode_alert(&bytes).unwrap();
        assert_eq!(decoded, occurrence);
    }

    #[test]
    fn empty_entity_id_is_rejected() {
        let payload = br#"{"entityId": "", "alertKind": "weak-signal", "value": -105,
                           "capturedAt": "2024-05-01T12:00:00Z"}"#;
        assert!(matches!(
            decode_alert(payload),
            Err(ModelError::MissingEntity)
        ));
    }

    #[test]
    fn unknown_alert_kind_is_malformed() {
        let payload = br#"{"entityId": "DEV-1", "alertKind": "reactor-meltdown", "value": 1,
                           "capturedAt": "2024-05-01T12:00:00Z"}"#;
        assert!(matches!(
            decode_alert(payload),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn severity_thresholds() {
        let at = Utc::now();
        let warn = AlertOccurrence::new("d", AlertKind::HighLoad, 75, at);
        let crit = AlertOccurrence::new("d", AlertKind::HighLoad, 85, at);
        assert_eq!(warn.severity(), Severity::Warning);
        assert_eq!(crit.severity(), Severity::Critical);

        let warn = AlertOccurrence::new("d", AlertKind::WeakSignal, -105, at);
        let crit = AlertOccurrence::new("d", AlertKind::WeakSignal, -115, at);
        assert_eq!(warn.severity(), Severity::Warning);
        assert_eq!(crit.severity(), Severity::Critical);
    }
}
