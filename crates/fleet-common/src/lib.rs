//! ---
//! fleet_section: "01-core"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared configuration and logging primitives."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Shared configuration and logging primitives for the FleetSim workspace.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, PipelineConfig, SimulatorConfig,
};
pub use logging::{init_tracing, LogFormat};
