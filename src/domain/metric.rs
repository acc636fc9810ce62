use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Measurement kind as declared by the producing wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricType {
    #[default]
    Untyped,
    Counter,
    Gauge,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Untyped => write!(f, "untyped"),
            MetricType::Counter => write!(f, "counter"),
            MetricType::Gauge => write!(f, "gauge"),
        }
    }
}

/// One decoded metric sample.
///
/// `label_keys` and `label_vals` are parallel arrays; every producer must
/// keep them the same length. `time` is epoch seconds, `0.0` meaning the
/// source did not stamp the sample and the scrape side assigns its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub time: f64,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Expected re-arrival period; drives staleness eviction downstream.
    pub interval: Duration,
    pub value: f64,
    pub label_keys: Vec<String>,
    pub label_vals: Vec<String>,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        time: f64,
        metric_type: MetricType,
        interval: Duration,
        value: f64,
        label_keys: Vec<String>,
        label_vals: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            time,
            metric_type,
            interval,
            value,
            label_keys,
            label_vals,
        }
    }

    /// Number of label keys; metrics sharing a dimension share an export group.
    pub fn dimension(&self) -> usize {
        self.label_keys.len()
    }

    pub fn labels_consistent(&self) -> bool {
        self.label_keys.len() == self.label_vals.len()
    }
}
