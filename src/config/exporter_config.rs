//! Exporter configuration parsing from environment variables.
//!
//! This module handles loading staleness, sweep cadence, and scrape
//! rendering knobs.

use crate::application::exporter::ExporterOptions;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Exporter environment configuration
#[derive(Debug, Clone)]
pub struct ExporterEnvConfig {
    pub expiration_multiple: u32,
    pub with_timestamp: bool,
    pub collector_sweep_seconds: u64,
    pub default_interval_seconds: u64,
}

impl Default for ExporterEnvConfig {
    fn default() -> Self {
        Self {
            expiration_multiple: 2,
            with_timestamp: false,
            collector_sweep_seconds: 10,
            default_interval_seconds: 10,
        }
    }
}

impl ExporterEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            expiration_multiple: Self::parse_u32("TELEGATE_EXPIRATION_MULTIPLE", 2)?,
            with_timestamp: Self::parse_bool("TELEGATE_EXPORT_WITH_TIMESTAMP", false),
            collector_sweep_seconds: Self::parse_u64("TELEGATE_COLLECTOR_SWEEP_SECONDS", 10)?,
            default_interval_seconds: Self::parse_u64(
                "TELEGATE_DEFAULT_METRIC_INTERVAL_SECONDS",
                10,
            )?,
        })
    }

    pub fn options(&self) -> ExporterOptions {
        ExporterOptions {
            expiration_multiple: self.expiration_multiple,
            with_timestamp: self.with_timestamp,
            collector_sweep: Duration::from_secs(self.collector_sweep_seconds.max(1)),
            default_interval: Duration::from_secs(self.default_interval_seconds.max(1)),
        }
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u32>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}
