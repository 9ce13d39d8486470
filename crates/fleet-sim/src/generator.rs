//! ---
//! fleet_section: "05-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Synthetic telemetry generation and fleet scheduling."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use rand::Rng;

use fleet_model::{MetricKind, TelemetrySample};

/// Variance applied around baseline-driven metrics, in metric units.
const VARIANCE: i64 = 10;
/// Probability of overriding load into the alerting range on one tick.
const LOAD_FAULT_PROBABILITY: f64 = 0.05;
/// Probability of overriding the 2.4 GHz channel into the alerting range.
const SIGNAL_FAULT_PROBABILITY: f64 = 0.03;

const SECONDS_PER_30_DAYS: i64 = 86_400 * 30;

/// One simulated device: a stable id plus immutable per-metric baselines.
///
/// Profiles are created once at startup and live for the process lifetime.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Stable device identifier, `DEV-00000001` style.
    pub id: String,
    /// Baseline load percentage.
    pub base_load: i64,
    /// Baseline memory percentage.
    pub base_memory: i64,
    /// Baseline 2.4 GHz signal, dBm.
    pub base_signal_2g: i64,
    /// Baseline 5 GHz signal, dBm.
    pub base_signal_5g: i64,
    /// Baseline 6 GHz signal, dBm.
    pub base_signal_6g: i64,
}

impl DeviceProfile {
    /// Draw a profile for the device at `index` (zero-based).
    pub fn draw<R: Rng + ?Sized>(index: usize, rng: &mut R) -> Self {
        Self {
            id: format!("DEV-{:08}", index + 1),
            base_load: rng.gen_range(30..60),
            base_memory: rng.gen_range(40..70),
            base_signal_2g: rng.gen_range(-70..-50),
            base_signal_5g: rng.gen_range(-75..-55),
            base_signal_6g: rng.gen_range(-80..-60),
        }
    }

    /// Draw an entire fleet of profiles.
    pub fn draw_fleet<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Self> {
        (0..count).map(|index| Self::draw(index, rng)).collect()
    }
}

/// Produce one telemetry sample for a device at a point in time.
///
/// Pure over its inputs: a fixed random source yields a fixed sample, which
/// is what the determinism tests rely on. Load and memory vary around their
/// baselines and clamp at zero; signal channels vary around their negative
/// baselines without clamping; temperatures, byte counters, and uptime are
/// drawn from fixed ranges uncorrelated with the baseline. Two independent
/// low-probability faults push load or the 2.4 GHz channel into alerting
/// range so the downstream rules have something to chew on.
pub fn synthesize<R: Rng + ?Sized>(
    profile: &DeviceProfile,
    rng: &mut R,
    at: DateTime<Utc>,
) -> TelemetrySample {
    let mut sample = TelemetrySample::new(&profile.id, at);

    sample.set_metric(MetricKind::Load, vary_clamped(profile.base_load, rng));
    sample.set_metric(MetricKind::Memory, vary_clamped(profile.base_memory, rng));

    sample.set_metric(MetricKind::CpuTemperature, rng.gen_range(45..60));
    sample.set_metric(MetricKind::BoardTemperature, rng.gen_range(40..50));
    sample.set_metric(MetricKind::RadioTemperature, rng.gen_range(50..65));

    sample.set_metric(MetricKind::Signal2Ghz, vary(profile.base_signal_2g, rng));
    sample.set_metric(MetricKind::Signal5Ghz, vary(profile.base_signal_5g, rng));
    sample.set_metric(MetricKind::Signal6Ghz, vary(profile.base_signal_6g, rng));

    sample.set_metric(MetricKind::BytesSent, rng.gen_range(0..1_000_000));
    sample.set_metric(MetricKind::BytesReceived, rng.gen_range(0..1_000_000));
    sample.set_metric(MetricKind::Uptime, rng.gen_range(0..SECONDS_PER_30_DAYS));

    if rng.gen_bool(LOAD_FAULT_PROBABILITY) {
        sample.set_metric(MetricKind::Load, rng.gen_range(65..95));
    }
    if rng.gen_bool(SIGNAL_FAULT_PROBABILITY) {
        sample.set_metric(MetricKind::Signal2Ghz, rng.gen_range(-105..-100));
    }

    sample
}

fn vary<R: Rng + ?Sized>(base: i64, rng: &mut R) -> i64 {
    base + rng.gen_range(-VARIANCE..=VARIANCE)
}

fn vary_clamped<R: Rng + ?Sized>(base: i64, rng: &mut R) -> i64 {
    vary(base, rng).max(0)
}
