//! Pipeline configuration parsing from environment variables.
//!
//! A pipeline is one listener socket tied to one wire handler, written
//! `udp:<bind-addr>:<handler>`. `TELEGATE_PIPELINES` takes a
//! comma-separated list of them.

use crate::infrastructure::handlers::HandlerKind;
use crate::infrastructure::transports::TransportKind;
use anyhow::{Context, Result, bail};
use std::env;
use std::fmt;
use std::str::FromStr;

/// One listener-to-handler binding.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub transport: TransportKind,
    pub address: String,
    pub handler: HandlerKind,
}

impl FromStr for PipelineConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The bind address may itself contain colons ([::1]:5000), so the
        // transport comes off the front and the handler off the back.
        let (transport_raw, rest) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("pipeline '{}' is not udp:<bind-addr>:<handler>", s))?;
        let (address, handler_raw) = rest
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("pipeline '{}' is not udp:<bind-addr>:<handler>", s))?;
        if address.is_empty() {
            bail!("pipeline '{}' has an empty bind address", s);
        }

        Ok(Self {
            transport: transport_raw
                .parse()
                .with_context(|| format!("pipeline '{}'", s))?,
            address: address.to_string(),
            handler: handler_raw
                .parse()
                .with_context(|| format!("pipeline '{}'", s))?,
        })
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.transport, self.address, self.handler)
    }
}

impl PipelineConfig {
    /// Parse `TELEGATE_PIPELINES`. Unset or empty means no listeners.
    pub fn list_from_env() -> Result<Vec<Self>> {
        let raw = env::var("TELEGATE_PIPELINES").unwrap_or_default();
        Self::parse_list(&raw).context("Failed to parse TELEGATE_PIPELINES")
    }

    fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}
