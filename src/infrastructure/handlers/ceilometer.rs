use crate::domain::errors::DecodeError;
use crate::domain::metric::{Metric, MetricType};
use crate::domain::ports::WireHandler;
use crate::infrastructure::bus::MetricBus;
use crate::infrastructure::handlers::sanitize_name;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Outer oslo.messaging envelope; the actual message is a nested JSON
/// string.
#[derive(Debug, Deserialize)]
struct Envelope {
    request: EnvelopeRequest,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRequest {
    #[serde(rename = "oslo.version", default)]
    oslo_version: String,
    #[serde(rename = "oslo.message")]
    oslo_message: String,
}

#[derive(Debug, Deserialize)]
struct OsloMessage {
    #[serde(default)]
    payload: Vec<CeilometerSample>,
}

#[derive(Debug, Deserialize)]
struct CeilometerSample {
    counter_name: String,
    #[serde(default)]
    counter_type: String,
    #[serde(default)]
    counter_unit: String,
    counter_volume: f64,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    resource_id: String,
    #[serde(default)]
    timestamp: String,
}

impl CeilometerSample {
    fn metric_name(&self) -> String {
        sanitize_name(&format!(
            "ceilometer_{}",
            self.counter_name.replace('.', "_")
        ))
    }

    fn metric_type(&self) -> MetricType {
        if self.counter_type == "cumulative" {
            MetricType::Counter
        } else {
            MetricType::Gauge
        }
    }

    fn labels(&self) -> (Vec<String>, Vec<String>) {
        let mut keys = Vec::new();
        let mut vals = Vec::new();
        if !self.project_id.is_empty() {
            keys.push("project".to_string());
            vals.push(self.project_id.clone());
        }
        if !self.resource_id.is_empty() {
            keys.push("resource".to_string());
            vals.push(self.resource_id.clone());
        }
        if !self.counter_unit.is_empty() {
            keys.push("unit".to_string());
            vals.push(self.counter_unit.clone());
        }
        (keys, vals)
    }
}

/// Ceilometer stamps samples with ISO 8601 strings, sometimes without a
/// zone designator. Unparseable stamps degrade to "unset".
fn parse_timestamp(raw: &str) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    if let Ok(stamped) = chrono::DateTime::parse_from_rfc3339(raw) {
        return stamped.timestamp_micros() as f64 / 1_000_000.0;
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc().timestamp_micros() as f64 / 1_000_000.0;
    }
    debug!("ceilometer: unparseable timestamp '{}'", raw);
    0.0
}

/// Decodes ceilometer metering envelopes and publishes one metric per
/// sample. Samples declare no re-arrival interval; the exporter clamps the
/// zero to its configured default.
pub struct CeilometerHandler {
    metric_bus: MetricBus,
}

impl CeilometerHandler {
    pub fn new(metric_bus: MetricBus) -> Self {
        Self { metric_bus }
    }
}

#[async_trait]
impl WireHandler for CeilometerHandler {
    fn kind(&self) -> &'static str {
        "ceilometer"
    }

    async fn handle(&self, frame: &[u8]) -> Result<usize, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(frame)?;
        if !envelope.request.oslo_version.is_empty() && envelope.request.oslo_version != "2.0" {
            return Err(DecodeError::unsupported(
                "ceilometer",
                "oslo.version",
                envelope.request.oslo_version,
            ));
        }
        let message: OsloMessage = serde_json::from_str(&envelope.request.oslo_message)?;

        let mut published = 0;
        for sample in &message.payload {
            let (label_keys, label_vals) = sample.labels();
            self.metric_bus
                .publish(Metric::new(
                    sample.metric_name(),
                    parse_timestamp(&sample.timestamp),
                    sample.metric_type(),
                    Duration::ZERO,
                    sample.counter_volume,
                    label_keys,
                    label_vals,
                ))
                .await;
            published += 1;
        }
        Ok(published)
    }
}
