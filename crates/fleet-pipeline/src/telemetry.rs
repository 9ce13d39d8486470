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

use fleet_bus::{BusError, BusPublisher, BusSubscriber, TOPIC_ALERTS};
use fleet_common::PipelineConfig;
use fleet_model::{decode_sample, MetricKind, TelemetrySample};
use fleet_store::{emit_optional, EventSink, MetricStore};

use crate::metrics::PipelineMetrics;
use crate::rules::{default_rules, AlertRule};

/// Per-message verdict of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retire the message; it will never be seen again.
    Ack,
    /// Return the message to the broker for redelivery.
    Nack,
}

/// Telemetry ingestion: decode, persist per metric, evaluate alert rules,
/// republish occurrences.
///
/// Disposition policy: undecodable payloads are poison (ack after logging,
/// redelivery cannot fix them); any store failure is retryable (nack after
/// the remaining metrics have still been attempted). Alert republication is
/// producer-side best-effort and never changes the verdict.
pub struct TelemetryPipeline {
    store: Arc<dyn MetricStore>,
    publisher: Arc<dyn BusPublisher>,
    rules: Vec<Box<dyn AlertRule>>,
    sink: Option<Arc<dyn EventSink>>,
    metrics: Option<PipelineMetrics>,
    status_log_every: u64,
    processed: AtomicU64,
}

impl TelemetryPipeline {
    /// Build a pipeline with the built-in rule chain and no sink.
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn MetricStore>,
        publisher: Arc<dyn BusPublisher>,
    ) -> Self {
        Self {
            store,
            publisher,
            rules: default_rules(),
            sink: None,
            metrics: None,
            status_log_every: config.status_log_every,
            processed: AtomicU64::new(0),
        }
    }

    /// Replace the rule chain.
    pub fn with_rules(mut self, rules: Vec<Box<dyn AlertRule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Mirror alert occurrences to an observability sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Record pipeline counters.
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Consume deliveries until shutdown or the subscription closes.
    pub async fn run(
        self: Arc<Self>,
        subscriber: Arc<dyn BusSubscriber>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("telemetry pipeline started");
        loop {
            let delivery = tokio::select! {
                _ = shutdown.changed() => break,
                received = subscriber.receive() => match received {
                    Ok(delivery) => delivery,
                    Err(BusError::Closed) => break,
                    Err(err) => {
                        warn!(error = %err, "telemetry subscription failure");
                        break;
                    }
                },
            };
            match self.handle(delivery.payload()).await {
                Disposition::Ack => delivery.ack(),
                Disposition::Nack => {
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_nack();
                    }
                    delivery.nack();
                }
            }
        }
        info!(
            processed = self.processed.load(Ordering::Relaxed),
            "telemetry pipeline stopped"
        );
    }

    /// Process one raw payload and decide its fate.
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let sample = match decode_sample(payload) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, "dropping undecodable telemetry payload");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_decode_failure();
                }
                return Disposition::Ack;
            }
        };

        let persist_failed = self.persist(&sample).await;
        self.evaluate_rules(&sample).await;

        if persist_failed {
            return Disposition::Nack;
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_processed();
        }
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.status_log_every == 0 {
            info!(processed, "ingestion progress");
        }
        Disposition::Ack
    }

    /// Fan one sample out into per-metric rows. A failed insert does not
    /// stop the remaining metrics; returns whether any insert failed.
    async fn persist(&self, sample: &TelemetrySample) -> bool {
        let mut failed = false;
        let mut rows = 0u64;
        for kind in MetricKind::ALL {
            let Some(value) = sample.metric(kind) else {
                continue;
            };
            match self
                .store
                .insert(&sample.device_id, kind.as_str(), value, sample.captured_at)
                .await
            {
                Ok(()) => rows += 1,
                Err(err) => {
                    warn!(
                        device = %sample.device_id,
                        metric = kind.as_str(),
                        error = %err,
                        "metric insert failed"
                    );
                    failed = true;
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.add_persisted_rows(rows);
        }
        failed
    }

    /// Run the full rule chain and republish every occurrence.
    async fn evaluate_rules(&self, sample: &TelemetrySample) {
        for rule in &self.rules {
            for occurrence in rule.evaluate(sample) {
                debug!(
                    device = %occurrence.device_id,
                    rule = rule.name(),
                    value = occurrence.value,
                    "alert condition met"
                );
                let payload = match serde_json::to_vec(&occurrence) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "alert encoding failed");
                        continue;
                    }
                };
                if let Err(err) = self
                    .publisher
                    .publish(TOPIC_ALERTS, payload, &occurrence.device_id)
                    .await
                {
                    warn!(error = %err, "alert publish failed");
                    continue;
                }
                if let Some(metrics) = &self.metrics {
                    metrics.inc_alert_emitted();
                }
                emit_optional(
                    &self.sink,
                    "ingest",
                    &occurrence.severity().to_string(),
                    &format!(
                        "{} on {}: {} = {}",
                        rule.name(),
                        occurrence.device_id,
                        occurrence.kind.as_str(),
                        occurrence.value
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use fleet_bus::memory::InMemoryBroker;
    use fleet_bus::{SubscriptionMode, TOPIC_TELEMETRY};
    use fleet_model::{decode_alert, AlertKind, Severity};
    use fleet_store::{MemoryStore, Result as StoreResult, StoreError};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BusPublisher for RecordingPublisher {
        async fn publish(
            &self,
            _topic: &'static str,
            payload: Vec<u8>,
            partition_key: &str,
        ) -> fleet_bus::Result<()> {
            self.published
                .lock()
                .push((partition_key.to_owned(), payload));
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn alerts(&self) -> Vec<fleet_model::AlertOccurrence> {
            self.published
                .lock()
                .iter()
                .map(|(_, payload)| decode_alert(payload).unwrap())
                .collect()
        }
    }

    /// Store failing specific insert calls, counted from 1.
    struct FlakyStore {
        inner: MemoryStore,
        fail_calls: Vec<u64>,
        calls: Mutex<u64>,
    }

    impl FlakyStore {
        fn failing(fail_calls: Vec<u64>) -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_calls,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricStore for FlakyStore {
        async fn insert(
            &self,
            device_id: &str,
            kind: &str,
            value: i64,
            at: DateTime<Utc>,
        ) -> StoreResult<()> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if self.fail_calls.contains(&call) {
                return Err(StoreError::Unavailable("injected outage".to_owned()));
            }
            self.inner.insert(device_id, kind, value, at).await
        }

        async fn range(
            &self,
            device_id: &str,
            kind: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> StoreResult<Vec<fleet_store::MetricPoint>> {
            self.inner.range(device_id, kind, from, to).await
        }

        async fn aggregate(
            &self,
            device_id: &str,
            kind: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> StoreResult<fleet_store::AggregateStats> {
            self.inner.aggregate(device_id, kind, from, to).await
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, String)>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, _service: &str, severity: &str, text: &str) {
            self.events.lock().push((severity.to_owned(), text.to_owned()));
        }
    }

    fn sample_payload(device: &str, pairs: &[(MetricKind, i64)]) -> Vec<u8> {
        let mut sample = TelemetrySample::new(device, Utc::now());
        for (kind, value) in pairs {
            sample.set_metric(*kind, *value);
        }
        serde_json::to_vec(&sample).unwrap()
    }

    fn pipeline_with(
        store: Arc<dyn MetricStore>,
        publisher: Arc<dyn BusPublisher>,
    ) -> TelemetryPipeline {
        TelemetryPipeline::new(&PipelineConfig::default(), store, publisher)
    }

    #[tokio::test]
    async fn high_load_sample_emits_one_warning_alert() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        let payload = sample_payload(
            "DEV-00000001",
            &[
                (MetricKind::Load, 75),
                (MetricKind::Signal2Ghz, -60),
                (MetricKind::Signal5Ghz, -70),
                (MetricKind::Signal6Ghz, -80),
            ],
        );
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);
        assert_eq!(store.len(), 4);

        let alerts = publisher.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::HighLoad);
        assert_eq!(alerts[0].value, 75);
        assert_eq!(alerts[0].severity(), Severity::Warning);
    }

    #[tokio::test]
    async fn weak_signal_sample_emits_one_warning_alert() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        let payload = sample_payload(
            "DEV-00000002",
            &[
                (MetricKind::Load, 40),
                (MetricKind::Signal2Ghz, -60),
                (MetricKind::Signal5Ghz, -70),
                (MetricKind::Signal6Ghz, -105),
            ],
        );
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);

        let alerts = publisher.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::WeakSignal);
        assert_eq!(alerts[0].value, -105);
        assert_eq!(alerts[0].severity(), Severity::Warning);
    }

    #[tokio::test]
    async fn critical_sample_trips_both_rules() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline =
            pipeline_with(store.clone(), publisher.clone()).with_sink(sink.clone());

        let payload = sample_payload(
            "DEV-00000003",
            &[
                (MetricKind::Load, 85),
                (MetricKind::Signal2Ghz, -60),
                (MetricKind::Signal5Ghz, -70),
                (MetricKind::Signal6Ghz, -115),
            ],
        );
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);

        let alerts = publisher.alerts();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity() == Severity::Critical));

        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(severity, _)| severity == "critical"));
    }

    #[tokio::test]
    async fn undecodable_payload_is_acked_and_dropped() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        assert_eq!(pipeline.handle(b"not json at all").await, Disposition::Ack);
        assert_eq!(
            pipeline
                .handle(br#"{"entityId": "", "measurements": {"load": 99}}"#)
                .await,
            Disposition::Ack
        );
        assert!(store.is_empty());
        assert!(publisher.alerts().is_empty());
    }

    #[tokio::test]
    async fn store_outage_nacks_after_trying_every_metric() {
        let store = Arc::new(FlakyStore::failing(vec![3]));
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        let mut sample = TelemetrySample::new("DEV-00000004", Utc::now());
        for kind in MetricKind::ALL {
            sample.set_metric(kind, 1);
        }
        let payload = serde_json::to_vec(&sample).unwrap();

        assert_eq!(pipeline.handle(&payload).await, Disposition::Nack);
        // one insert failed, the other ten still landed
        assert_eq!(store.inner.len(), MetricKind::ALL.len() - 1);
    }

    #[tokio::test]
    async fn unrecognized_measurement_names_are_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        let mut sample = TelemetrySample::new("DEV-00000008", Utc::now());
        sample.set_metric(MetricKind::Load, 10);
        sample
            .measurements
            .insert("firmware-crc-errors".to_owned(), 123);

        let payload = serde_json::to_vec(&sample).unwrap();
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count_kind("load"), 1);
    }

    #[tokio::test]
    async fn replayed_delivery_produces_duplicate_rows() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone());

        let payload = sample_payload("DEV-00000005", &[(MetricKind::Load, 75)]);
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);
        assert_eq!(pipeline.handle(&payload).await, Disposition::Ack);

        assert_eq!(store.count_kind("load"), 2);
        assert_eq!(publisher.alerts().len(), 2);
    }

    #[tokio::test]
    async fn nacked_delivery_is_reprocessed_to_completion() {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(FlakyStore::failing(vec![1]));
        let pipeline = Arc::new(pipeline_with(store.clone(), broker.clone()));

        let subscriber = Arc::new(
            broker
                .subscribe(TOPIC_TELEMETRY, "ingest", SubscriptionMode::Shared)
                .unwrap(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(pipeline.clone().run(subscriber, shutdown_rx));

        let payload = sample_payload(
            "DEV-00000006",
            &[(MetricKind::Load, 10), (MetricKind::Memory, 50)],
        );
        broker
            .publish(TOPIC_TELEMETRY, payload, "DEV-00000006")
            .await
            .unwrap();

        // first attempt drops one insert and nacks; the redelivery lands both
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while store.inner.len() < 3 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("redelivery should complete the sample");

        let _ = shutdown_tx.send(true);
        let _ = worker.await;
        assert_eq!(store.inner.count_kind("memory"), 1 + 1);
        assert_eq!(store.inner.count_kind("load"), 1);
    }

    #[tokio::test]
    async fn metrics_track_dispositions() {
        let registry = crate::metrics::new_registry();
        let metrics = PipelineMetrics::new(registry.clone()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let pipeline = pipeline_with(store.clone(), publisher.clone()).with_metrics(metrics);

        let payload = sample_payload("DEV-00000007", &[(MetricKind::Load, 75)]);
        pipeline.handle(&payload).await;
        pipeline.handle(b"garbage").await;

        let families = registry.gather();
        let value = |name: &str| {
            families
                .iter()
                .find(|f| f.get_name() == name)
                .map(|f| f.get_metric()[0].get_counter().get_value())
                .unwrap_or_default()
        };
        assert_eq!(value("fleet_pipeline_processed_total"), 1.0);
        assert_eq!(value("fleet_pipeline_decode_failures_total"), 1.0);
        assert_eq!(value("fleet_pipeline_persisted_rows_total"), 1.0);
        assert_eq!(value("fleet_pipeline_alerts_emitted_total"), 1.0);
    }
}
