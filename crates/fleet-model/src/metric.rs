//! ---
//! fleet_section: "02-data-model"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry schema and alert/metric taxonomy."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Closed enumeration of recognized measurement names.
///
/// The string form doubles as the wire measurement key and the storage kind
/// name. Measurement keys outside this set are free-form extension fields:
/// they travel with the sample but are silently excluded from persistence.
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
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MetricKind {
    /// Processor load percentage, 0-100.
    Load,
    /// Memory usage percentage, 0-100.
    Memory,
    /// Processor die temperature, degrees Celsius.
    CpuTemperature,
    /// Mainboard temperature, degrees Celsius.
    BoardTemperature,
    /// Radio module temperature, degrees Celsius.
    RadioTemperature,
    /// 2.4 GHz band signal strength, dBm.
    #[serde(rename = "signal-2ghz")]
    #[strum(serialize = "signal-2ghz")]
    Signal2Ghz,
    /// 5 GHz band signal strength, dBm.
    #[serde(rename = "signal-5ghz")]
    #[strum(serialize = "signal-5ghz")]
    Signal5Ghz,
    /// 6 GHz band signal strength, dBm.
    #[serde(rename = "signal-6ghz")]
    #[strum(serialize = "signal-6ghz")]
    Signal6Ghz,
    /// Cumulative bytes sent on the primary interface.
    BytesSent,
    /// Cumulative bytes received on the primary interface.
    BytesReceived,
    /// Seconds since device boot.
    Uptime,
}

impl MetricKind {
    /// Every recognized metric kind, in persistence fan-out order.
    pub const ALL: [MetricKind; 11] = [
        MetricKind::Load,
        MetricKind::Memory,
        MetricKind::CpuTemperature,
        MetricKind::BoardTemperature,
        MetricKind::RadioTemperature,
        MetricKind::Signal2Ghz,
        MetricKind::Signal5Ghz,
        MetricKind::Signal6Ghz,
        MetricKind::BytesSent,
        MetricKind::BytesReceived,
        MetricKind::Uptime,
    ];

    /// The tracked signal-strength channels.
    pub const SIGNALS: [MetricKind; 3] = [
        MetricKind::Signal2Ghz,
        MetricKind::Signal5Ghz,
        MetricKind::Signal6Ghz,
    ];

    /// Stable string name used both on the wire and as the storage kind.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}
