//! Bus configuration parsing from environment variables.
//!
//! This module handles loading dispatch mode, queue sizing, and the
//! overflow policy shared by both buses.

use crate::infrastructure::bus::{BusOptions, DispatchMode, OverflowPolicy};
use anyhow::{Context, Result};
use std::env;

/// Bus environment configuration
#[derive(Debug, Clone)]
pub struct BusEnvConfig {
    pub blocking: bool,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BusEnvConfig {
    fn default() -> Self {
        Self {
            blocking: false,
            queue_capacity: 256,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl BusEnvConfig {
    pub fn from_env() -> Result<Self> {
        let overflow = match env::var("TELEGATE_BUS_OVERFLOW") {
            Ok(raw) => raw
                .parse::<OverflowPolicy>()
                .context("Failed to parse TELEGATE_BUS_OVERFLOW")?,
            Err(_) => OverflowPolicy::Block,
        };

        Ok(Self {
            blocking: Self::parse_bool("TELEGATE_BUS_BLOCKING", false),
            queue_capacity: Self::parse_usize("TELEGATE_BUS_QUEUE_CAPACITY", 256)?,
            overflow,
        })
    }

    /// Dispatch options for one bus instance.
    pub fn options(&self) -> BusOptions {
        BusOptions {
            mode: if self.blocking {
                DispatchMode::Blocking
            } else {
                DispatchMode::NonBlocking
            },
            queue_capacity: self.queue_capacity,
            overflow: self.overflow,
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}
