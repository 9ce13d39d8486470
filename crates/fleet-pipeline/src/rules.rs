//! ---
//! fleet_section: "06-consumption"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry ingestion and alert-processing pipelines."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use fleet_model::{AlertKind, AlertOccurrence, TelemetrySample};

/// One detection rule evaluated against every ingested sample.
///
/// Rules are pure: no I/O, no shared state. A rule inspects one sample and
/// reports zero or more occurrences; missing metrics mean "no opinion",
/// never an error. The chain runs every rule in registration order
/// regardless of earlier matches.
pub trait AlertRule: Send + Sync {
    /// Stable rule name for logs.
    fn name(&self) -> &'static str;

    /// Evaluate one sample.
    fn evaluate(&self, sample: &TelemetrySample) -> Vec<AlertOccurrence>;
}

/// Fires when the load metric exceeds 60.
#[derive(Debug, Default)]
pub struct LoadRule;

impl AlertRule for LoadRule {
    fn name(&self) -> &'static str {
        "high-load"
    }

    fn evaluate(&self, sample: &TelemetrySample) -> Vec<AlertOccurrence> {
        match sample.metric(fleet_model::MetricKind::Load) {
            Some(load) if load > 60 => vec![AlertOccurrence::new(
                sample.device_id.clone(),
                AlertKind::HighLoad,
                load,
                sample.captured_at,
            )],
            _ => Vec::new(),
        }
    }
}

/// Fires when the weakest tracked signal channel falls below -100 dBm.
#[derive(Debug, Default)]
pub struct SignalRule;

impl AlertRule for SignalRule {
    fn name(&self) -> &'static str {
        "weak-signal"
    }

    fn evaluate(&self, sample: &TelemetrySample) -> Vec<AlertOccurrence> {
        match sample.weakest_signal() {
            Some(weakest) if weakest < -100 => vec![AlertOccurrence::new(
                sample.device_id.clone(),
                AlertKind::WeakSignal,
                weakest,
                sample.captured_at,
            )],
            _ => Vec::new(),
        }
    }
}

/// The built-in rule chain, in evaluation order.
pub fn default_rules() -> Vec<Box<dyn AlertRule>> {
    vec![Box::new(LoadRule), Box::new(SignalRule)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_model::MetricKind;

    fn sample_with(pairs: &[(MetricKind, i64)]) -> TelemetrySample {
        let mut sample = TelemetrySample::new("DEV-00000001", Utc::now());
        for (kind, value) in pairs {
            sample.set_metric(*kind, *value);
        }
        sample
    }

    #[test]
    fn load_rule_fires_strictly_above_threshold() {
        let rule = LoadRule;
        assert!(rule.evaluate(&sample_with(&[(MetricKind::Load, 60)])).is_empty());
        let hits = rule.evaluate(&sample_with(&[(MetricKind::Load, 61)]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, AlertKind::HighLoad);
        assert_eq!(hits[0].value, 61);
    }

    #[test]
    fn load_rule_ignores_samples_without_load() {
        let rule = LoadRule;
        assert!(rule
            .evaluate(&sample_with(&[(MetricKind::Memory, 99)]))
            .is_empty());
    }

    #[test]
    fn signal_rule_uses_the_weakest_channel() {
        let rule = SignalRule;
        let hits = rule.evaluate(&sample_with(&[
            (MetricKind::Signal2Ghz, -60),
            (MetricKind::Signal5Ghz, -70),
            (MetricKind::Signal6Ghz, -105),
        ]));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, AlertKind::WeakSignal);
        assert_eq!(hits[0].value, -105);
    }

    #[test]
    fn signal_rule_boundary_is_exclusive() {
        let rule = SignalRule;
        assert!(rule
            .evaluate(&sample_with(&[(MetricKind::Signal2Ghz, -100)]))
            .is_empty());
        assert_eq!(
            rule.evaluate(&sample_with(&[(MetricKind::Signal2Ghz, -101)]))
                .len(),
            1
        );
    }

    #[test]
    fn chain_is_deterministic_for_a_given_sample() {
        let sample = sample_with(&[(MetricKind::Load, 85), (MetricKind::Signal5Ghz, -115)]);
        let rules = default_rules();
        let first: Vec<_> = rules.iter().flat_map(|r| r.evaluate(&sample)).collect();
        let second: Vec<_> = rules.iter().flat_map(|r| r.evaluate(&sample)).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
