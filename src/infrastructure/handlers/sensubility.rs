use crate::domain::errors::DecodeError;
use crate::domain::event::{Event, EventSeverity, EventType};
use crate::domain::ports::WireHandler;
use crate::infrastructure::bus::EventBus;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct CheckResult {
    #[serde(default)]
    client: String,
    #[serde(default)]
    check: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    output: String,
    #[serde(default)]
    executed: f64,
}

impl CheckResult {
    /// Nagios convention: 0 ok, 1 warning, 2 critical, everything else
    /// unknown.
    fn severity(&self) -> EventSeverity {
        match self.status {
            0 => EventSeverity::Info,
            1 => EventSeverity::Warning,
            2 => EventSeverity::Critical,
            _ => EventSeverity::Unknown,
        }
    }
}

/// Decodes sensubility health-check results into events.
pub struct SensubilityHandler {
    event_bus: EventBus,
}

impl SensubilityHandler {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl WireHandler for SensubilityHandler {
    fn kind(&self) -> &'static str {
        "sensubility"
    }

    async fn handle(&self, frame: &[u8]) -> Result<usize, DecodeError> {
        let result: CheckResult = serde_json::from_slice(frame)?;
        if result.check.is_empty() {
            return Err(DecodeError::malformed(
                "sensubility",
                "check result carries no check name",
            ));
        }

        let mut labels = HashMap::new();
        labels.insert("check".to_string(), json!(result.check));
        labels.insert("client".to_string(), json!(result.client));
        labels.insert("status".to_string(), json!(result.status));

        let mut annotations = HashMap::new();
        annotations.insert("output".to_string(), json!(result.output));

        self.event_bus
            .publish(Event {
                index: format!("sensubility-{}", result.check),
                time: result.executed,
                event_type: EventType::Result,
                publisher: result.client.clone(),
                severity: result.severity(),
                labels,
                annotations,
            })
            .await;
        Ok(1)
    }
}
