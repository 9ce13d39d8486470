//! ---
//! fleet_section: "04-persistence"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Storage, cache, and observability-sink contracts."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

/// Fire-and-forget observability sink.
///
/// `emit` must never block or fail the caller; a configuration without a
/// sink is legal and silent (callers hold `Option<Arc<dyn EventSink>>`).
pub trait EventSink: Send + Sync {
    /// Send one text event attributed to a service at a severity.
    fn emit(&self, service: &str, severity: &str, text: &str);
}

/// Sink that forwards events to the local tracing subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, service: &str, severity: &str, text: &str) {
        match severity {
            "error" | "critical" => tracing::error!(service, "{}", text),
            "warning" | "warn" => tracing::warn!(service, "{}", text),
            _ => tracing::info!(service, "{}", text),
        }
    }
}

/// Emit to an optional sink, the common call shape in the pipelines.
pub fn emit_optional(sink: &Option<Arc<dyn EventSink>>, service: &str, severity: &str, text: &str) {
    if let Some(sink) = sink {
        sink.emit(service, severity, text);
    }
}
