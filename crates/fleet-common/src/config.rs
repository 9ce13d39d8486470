//! ---
//! fleet_section: "01-core"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared configuration and logging primitives."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_device_count() -> usize {
    20_000
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_startup_jitter_ms() -> u64 {
    1_000
}

fn default_tick_jitter_ms() -> u64 {
    10
}

fn default_batch_size() -> usize {
    50
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_queue_capacity() -> usize {
    // ten full batches of headroom before senders feel backpressure
    default_batch_size() * 10
}

fn default_telemetry_group() -> String {
    "ingest".to_owned()
}

fn default_alert_group() -> String {
    "alert-processor".to_owned()
}

fn default_status_log_every() -> u64 {
    50
}

fn default_log_filter() -> String {
    "info".to_owned()
}

/// Primary configuration object for the FleetSim runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fleet simulation settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Consumption pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    /// The parsed, validated configuration.
    pub config: AppConfig,
    /// Effective source path, `None` when built-in defaults were used.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Environment variable overriding the candidate search paths.
    pub const ENV_CONFIG_PATH: &'static str = "FLEET_CONFIG";

    /// Load configuration from disk, respecting the `FLEET_CONFIG` override.
    ///
    /// Falls back to built-in defaults when no candidate exists; a file that
    /// exists but fails to parse or validate is fatal.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        let config = AppConfig::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulator.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Settings for the synthetic fleet and batching aggregator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Number of simulated devices spawned at startup.
    #[serde(default = "default_device_count")]
    pub device_count: usize,
    /// Interval between samples for each device.
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tick_interval: Duration,
    /// One-time random startup delay per device, upper bound in milliseconds.
    #[serde(default = "default_startup_jitter_ms")]
    pub startup_jitter_ms: u64,
    /// Small per-tick random delay, upper bound in milliseconds.
    #[serde(default = "default_tick_jitter_ms")]
    pub tick_jitter_ms: u64,
    /// Buffer size that triggers a flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wall-clock bound on publish latency under low traffic.
    #[serde(default = "default_flush_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub flush_interval: Duration,
    /// Bounded capacity of the intake queue between devices and aggregator.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seed for the fleet random source; `None` seeds from process entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.device_count == 0 {
            return Err(anyhow!("simulator.device_count must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("simulator.batch_size must be greater than zero"));
        }
        if self.flush_interval.is_zero() {
            return Err(anyhow!("simulator.flush_interval must be greater than zero"));
        }
        if self.queue_capacity < self.batch_size {
            return Err(anyhow!(
                "simulator.queue_capacity ({}) must be at least batch_size ({})",
                self.queue_capacity,
                self.batch_size
            ));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_count: default_device_count(),
            tick_interval: default_tick_interval(),
            startup_jitter_ms: default_startup_jitter_ms(),
            tick_jitter_ms: default_tick_jitter_ms(),
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
            seed: None,
        }
    }
}

/// Settings for the consumption pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Subscription group name for the telemetry topic.
    #[serde(default = "default_telemetry_group")]
    pub telemetry_group: String,
    /// Subscription group name for the alert topic.
    #[serde(default = "default_alert_group")]
    pub alert_group: String,
    /// Emit a status log line every N processed messages.
    #[serde(default = "default_status_log_every")]
    pub status_log_every: u64,
}

impl PipelineConfig {
    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.telemetry_group.trim().is_empty() || self.alert_group.trim().is_empty() {
            return Err(anyhow!("pipeline group names must be non-empty"));
        }
        if self.status_log_every == 0 {
            return Err(anyhow!("pipeline.status_log_every must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            telemetry_group: default_telemetry_group(),
            alert_group: default_alert_group(),
            status_log_every: default_status_log_every(),
        }
    }
}

/// Logging settings for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format for the stdout layer.
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive when no environment override is present.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}
