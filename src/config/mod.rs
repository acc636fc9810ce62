//! Configuration module for Telegate.
//!
//! This module provides structured configuration loading from environment
//! variables, organized by concern: Buses, Exporter, and Pipelines.

mod bus_config;
mod exporter_config;
mod pipeline_config;

pub use bus_config::BusEnvConfig;
pub use exporter_config::ExporterEnvConfig;
pub use pipeline_config::PipelineConfig;

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Main gateway configuration.
///
/// This struct aggregates all configuration from sub-modules and is loaded
/// once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bus: BusEnvConfig,
    pub exporter: ExporterEnvConfig,
    pub pipelines: Vec<PipelineConfig>,
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusEnvConfig::default(),
            exporter: ExporterEnvConfig::default(),
            pipelines: Vec::new(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bus = BusEnvConfig::from_env().context("Failed to load bus config")?;
        let exporter = ExporterEnvConfig::from_env().context("Failed to load exporter config")?;
        let pipelines = PipelineConfig::list_from_env()?;

        let shutdown_grace_seconds = env::var("TELEGATE_SHUTDOWN_GRACE_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("Failed to parse TELEGATE_SHUTDOWN_GRACE_SECONDS")?;

        Ok(Self {
            bus,
            exporter,
            pipelines,
            shutdown_grace: Duration::from_secs(shutdown_grace_seconds),
        })
    }
}
