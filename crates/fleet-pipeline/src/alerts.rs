//! ---
//! fleet_section: "06-consumption"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Telemetry ingestion and alert-processing pipelines."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use fleet_bus::{BusError, BusSubscriber};
use fleet_model::decode_alert;
use fleet_store::MetricStore;

use crate::telemetry::Disposition;

/// Alert-event consumer: decode an occurrence and persist it as a row
/// keyed by its alert kind.
///
/// Same disposition policy as ingestion: undecodable events are poison and
/// acked, store outages are nacked for redelivery. Duplicate rows from
/// redelivered events are legal.
pub struct AlertPipeline {
    store: Arc<dyn MetricStore>,
    processed: AtomicU64,
}

impl AlertPipeline {
    /// Build an alert pipeline over the given store.
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            processed: AtomicU64::new(0),
        }
    }

    /// Consume deliveries until shutdown or the subscription closes.
    pub async fn run(
        self: Arc<Self>,
        subscriber: Arc<dyn BusSubscriber>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("alert pipeline started");
        loop {
            let delivery = tokio::select! {
                _ = shutdown.changed() => break,
                received = subscriber.receive() => match received {
                    Ok(delivery) => delivery,
                    Err(BusError::Closed) => break,
                    Err(err) => {
                        warn!(error = %err, "alert subscription failure");
                        break;
                    }
                },
            };
            match self.handle(delivery.payload()).await {
                Disposition::Ack => delivery.ack(),
                Disposition::Nack => delivery.nack(),
            }
        }
        info!(
            processed = self.processed.load(Ordering::Relaxed),
            "alert pipeline stopped"
        );
    }

    /// Process one alert-event payload.
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let alert = match decode_alert(payload) {
            Ok(alert) => alert,
            Err(err) => {
                warn!(error = %err, "dropping undecodable alert event");
                return Disposition::Ack;
            }
        };

        if let Err(err) = self
            .store
            .insert(
                &alert.device_id,
                alert.kind.as_str(),
                alert.value,
                alert.captured_at,
            )
            .await
        {
            warn!(
                device = %alert.device_id,
                kind = alert.kind.as_str(),
                error = %err,
                "alert insert failed"
            );
            return Disposition::Nack;
        }

        debug!(
            device = %alert.device_id,
            kind = alert.kind.as_str(),
            value = alert.value,
            severity = %alert.severity(),
            "alert persisted"
        );
        self.processed.fetch_add(1, Ordering::Relaxed);
        Disposition::Ack
    }
}
