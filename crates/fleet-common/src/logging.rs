//! ---
//! fleet_section: "01-core"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared configuration and logging primitives."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "FLEET_LOG";

/// Available log formats for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// Structured JSON for container log collection.
    StructuredJson,
}

/// Initialize the tracing subscriber based on configuration and environment.
///
/// `FLEET_LOG` overrides the filter directive; when unset the standard
/// `RUST_LOG` variable is honoured, finally falling back to the configured
/// default. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); using configured filter",
                LOG_ENV, err
            );
            EnvFilter::new(&config.filter)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.filter)),
    };

    let fmt_layer = match config.format {
        LogFormat::Compact => fmt::layer().with_target(true).compact().boxed(),
        LogFormat::StructuredJson => fmt::layer().with_target(false).json().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig::default();
        init_tracing(&config);
        init_tracing(&config);
        tracing::info!("logging initialised in test");
    }

    #[test]
    fn format_parses_from_kebab_case() {
        let format: LogFormat = serde_json::from_str("\"structured-json\"").unwrap();
        assert_eq!(format, LogFormat::StructuredJson);
    }
}
