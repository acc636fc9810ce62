mod ceilometer;
mod collectd;
mod sensubility;

pub use ceilometer::CeilometerHandler;
pub use collectd::CollectdHandler;
pub use sensubility::SensubilityHandler;

use crate::domain::ports::WireHandler;
use crate::infrastructure::bus::{EventBus, MetricBus};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Wire formats the gateway can decode. A fixed set resolved from
/// configuration at startup; there is no runtime plugin loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    CollectdMetrics,
    CeilometerMetrics,
    SensubilityEvents,
}

impl HandlerKind {
    /// Construct the handler, wired to the buses it publishes on.
    pub fn build(self, metric_bus: MetricBus, event_bus: EventBus) -> Arc<dyn WireHandler> {
        match self {
            HandlerKind::CollectdMetrics => Arc::new(CollectdHandler::new(metric_bus)),
            HandlerKind::CeilometerMetrics => Arc::new(CeilometerHandler::new(metric_bus)),
            HandlerKind::SensubilityEvents => Arc::new(SensubilityHandler::new(event_bus)),
        }
    }
}

impl FromStr for HandlerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "collectd" => Ok(HandlerKind::CollectdMetrics),
            "ceilometer" => Ok(HandlerKind::CeilometerMetrics),
            "sensubility" => Ok(HandlerKind::SensubilityEvents),
            other => anyhow::bail!("unknown handler: {}", other),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::CollectdMetrics => write!(f, "collectd"),
            HandlerKind::CeilometerMetrics => write!(f, "ceilometer"),
            HandlerKind::SensubilityEvents => write!(f, "sensubility"),
        }
    }
}

/// Map any character prometheus would not accept in a metric name to '_'.
pub(crate) fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
