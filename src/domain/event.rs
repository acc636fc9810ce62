use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Coarse classification of a decoded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Error,
    Event,
    Log,
    Result,
    Task,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Error => write!(f, "error"),
            EventType::Event => write!(f, "event"),
            EventType::Log => write!(f, "log"),
            EventType::Result => write!(f, "result"),
            EventType::Task => write!(f, "task"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    #[default]
    Unknown,
    Info,
    Warning,
    Critical,
}

impl fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSeverity::Unknown => write!(f, "unknown"),
            EventSeverity::Info => write!(f, "info"),
            EventSeverity::Warning => write!(f, "warning"),
            EventSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// One decoded event. `index` groups related events for downstream storage,
/// `labels` carry identity, `annotations` carry free-form detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub index: String,
    pub time: f64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub publisher: String,
    pub severity: EventSeverity,
    #[serde(default)]
    pub labels: HashMap<String, Value>,
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
}
