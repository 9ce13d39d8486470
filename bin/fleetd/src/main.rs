//! ---
//! fleet_section: "07-daemon"
//! fleet_subsection: "binary"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Binary entrypoint for the FleetSim daemon."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fleet_bus::memory::InMemoryBroker;
use fleet_bus::{SubscriptionMode, TOPIC_ALERTS, TOPIC_TELEMETRY};
use fleet_common::{init_tracing, AppConfig};
use fleet_pipeline::{new_registry, AlertPipeline, PipelineMetrics, TelemetryPipeline};
use fleet_sim::FleetRunner;
use fleet_store::{MemoryStore, TracingSink};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "FleetSim daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Override the simulated device count")]
    devices: Option<usize>,

    #[arg(long, value_name = "SECS", help = "Override the per-device sample interval")]
    tick_interval: Option<u64>,

    #[arg(long, value_name = "SEED", help = "Seed the fleet for reproducible runs")]
    seed: Option<u64>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Run for a bounded duration instead of waiting for ctrl-c"
    )]
    run_for: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/fleetsim.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(devices) = cli.devices {
        config.simulator.device_count = devices;
    }
    if let Some(secs) = cli.tick_interval {
        config.simulator.tick_interval = Duration::from_secs(secs);
    }
    if let Some(seed) = cli.seed {
        config.simulator.seed = Some(seed);
    }
    config.validate()?;

    init_tracing(&config.logging);
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("using built-in configuration defaults"),
    }

    let registry = new_registry();
    let metrics = PipelineMetrics::new(registry.clone())?;

    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(TracingSink);

    let telemetry_sub = Arc::new(broker.subscribe(
        TOPIC_TELEMETRY,
        &config.pipeline.telemetry_group,
        SubscriptionMode::Shared,
    )?);
    let alert_sub = Arc::new(broker.subscribe(
        TOPIC_ALERTS,
        &config.pipeline.alert_group,
        SubscriptionMode::Shared,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let telemetry_pipeline = Arc::new(
        TelemetryPipeline::new(&config.pipeline, store.clone(), broker.clone())
            .with_sink(sink)
            .with_metrics(metrics),
    );
    let telemetry_task = tokio::spawn(
        telemetry_pipeline
            .clone()
            .run(telemetry_sub, shutdown_rx.clone()),
    );

    let alert_pipeline = Arc::new(AlertPipeline::new(store.clone()));
    let alert_task = tokio::spawn(alert_pipeline.clone().run(alert_sub, shutdown_rx.clone()));

    info!(
        devices = config.simulator.device_count,
        tick_interval_secs = config.simulator.tick_interval.as_secs(),
        "starting fleet"
    );
    let runner = FleetRunner::spawn(&config.simulator, broker.clone());

    match cli.run_for {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(run_for_secs = secs, "bounded run elapsed");
                }
                _ = signal::ctrl_c() => info!("interrupt received"),
            }
        }
        None => {
            signal::ctrl_c().await?;
            info!("interrupt received");
        }
    }

    // devices stop and the aggregator performs its final flush first
    let stats = runner.shutdown().await;

    // let the consumers drain what the final flush just published
    tokio::time::sleep(Duration::from_millis(500)).await;
    let _ = shutdown_tx.send(true);
    for (task, name) in [(telemetry_task, "telemetry"), (alert_task, "alerts")] {
        if let Err(err) = task.await {
            warn!(pipeline = name, error = %err, "pipeline task join failure");
        }
    }

    info!(
        accepted = stats.accepted,
        published = stats.aggregator.published,
        flushes = stats.aggregator.flushes,
        stored_rows = store.len(),
        "fleetd stopped"
    );
    Ok(())
}
