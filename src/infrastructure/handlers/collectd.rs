use crate::domain::errors::DecodeError;
use crate::domain::metric::{Metric, MetricType};
use crate::domain::ports::WireHandler;
use crate::infrastructure::bus::MetricBus;
use crate::infrastructure::handlers::sanitize_name;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One collectd value-list as emitted by the JSON write plugin. A list
/// carries parallel `values`/`dstypes`/`dsnames` arrays, one metric each.
#[derive(Debug, Deserialize)]
struct ValueList {
    values: Vec<Option<f64>>,
    dstypes: Vec<String>,
    #[serde(default)]
    dsnames: Vec<String>,
    #[serde(default)]
    time: f64,
    #[serde(default)]
    interval: f64,
    #[serde(default)]
    host: String,
    plugin: String,
    #[serde(default)]
    plugin_instance: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    type_instance: String,
}

impl ValueList {
    /// `collectd_{plugin}[_{type}][_{dsname}]`; the type is skipped when it
    /// repeats the plugin, the dsname when it is the placeholder "value".
    fn metric_name(&self, index: usize) -> String {
        let mut name = format!("collectd_{}", self.plugin);
        if self.type_name != self.plugin {
            name.push('_');
            name.push_str(&self.type_name);
        }
        if let Some(dsname) = self.dsnames.get(index) {
            if dsname != "value" {
                name.push('_');
                name.push_str(dsname);
            }
        }
        sanitize_name(&name)
    }

    /// Labels for every metric of this list; empty instances are omitted,
    /// so the label count varies with how the source qualified the sample.
    fn labels(&self) -> (Vec<String>, Vec<String>) {
        let mut keys = Vec::new();
        let mut vals = Vec::new();
        if !self.host.is_empty() {
            keys.push("host".to_string());
            vals.push(self.host.clone());
        }
        if !self.plugin_instance.is_empty() {
            keys.push("plugin_instance".to_string());
            vals.push(self.plugin_instance.clone());
        }
        if !self.type_instance.is_empty() {
            keys.push("type_instance".to_string());
            vals.push(self.type_instance.clone());
        }
        (keys, vals)
    }
}

fn metric_type(dstype: &str) -> MetricType {
    match dstype {
        "gauge" => MetricType::Gauge,
        "counter" | "derive" | "absolute" => MetricType::Counter,
        _ => MetricType::Untyped,
    }
}

/// Decodes collectd JSON frames and publishes one metric per value.
pub struct CollectdHandler {
    metric_bus: MetricBus,
}

impl CollectdHandler {
    pub fn new(metric_bus: MetricBus) -> Self {
        Self { metric_bus }
    }
}

#[async_trait]
impl WireHandler for CollectdHandler {
    fn kind(&self) -> &'static str {
        "collectd"
    }

    async fn handle(&self, frame: &[u8]) -> Result<usize, DecodeError> {
        let lists: Vec<ValueList> = serde_json::from_slice(frame)?;
        let mut published = 0;
        for list in &lists {
            if list.values.len() != list.dstypes.len() {
                return Err(DecodeError::malformed(
                    "collectd",
                    format!(
                        "'{}' carries {} values against {} dstypes",
                        list.plugin,
                        list.values.len(),
                        list.dstypes.len()
                    ),
                ));
            }
            let (label_keys, label_vals) = list.labels();
            let interval = Duration::try_from_secs_f64(list.interval).unwrap_or(Duration::ZERO);
            for (index, value) in list.values.iter().enumerate() {
                let Some(value) = value else {
                    // collectd writes NaN readings as JSON null.
                    debug!("collectd: null value in '{}', skipped", list.plugin);
                    continue;
                };
                self.metric_bus
                    .publish(Metric::new(
                        list.metric_name(index),
                        list.time,
                        metric_type(&list.dstypes[index]),
                        interval,
                        *value,
                        label_keys.clone(),
                        label_vals.clone(),
                    ))
                    .await;
                published += 1;
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Subscriber;
    use crate::infrastructure::bus::{Bus, BusOptions, DispatchMode};
    use parking_lot::Mutex;
    use prometheus::IntCounter;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Capture {
        metrics: Arc<Mutex<Vec<Metric>>>,
    }

    #[async_trait]
    impl Subscriber<Metric> for Capture {
        fn id(&self) -> &str {
            "capture"
        }

        async fn receive(&self, payload: Metric) {
            self.metrics.lock().push(payload);
        }
    }

    async fn capturing_handler() -> (CollectdHandler, Arc<Mutex<Vec<Metric>>>) {
        let options = BusOptions {
            mode: DispatchMode::Blocking,
            ..BusOptions::default()
        };
        let bus: MetricBus = Bus::new(
            "metrics",
            options,
            CancellationToken::new(),
            IntCounter::new("dropped", "dropped").unwrap(),
        );
        let metrics = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Capture {
            metrics: Arc::clone(&metrics),
        }))
        .await;
        (CollectdHandler::new(bus), metrics)
    }

    #[tokio::test]
    async fn test_decodes_a_two_value_list() {
        let (handler, captured) = capturing_handler().await;
        let frame = br#"[{
            "values": [197141504, 175136768],
            "dstypes": ["counter", "counter"],
            "dsnames": ["read", "write"],
            "time": 1346867040.2,
            "interval": 10.0,
            "host": "node-1",
            "plugin": "disk",
            "plugin_instance": "sda",
            "type": "disk_octets",
            "type_instance": ""
        }]"#;

        let published = handler.handle(frame).await.unwrap();
        assert_eq!(published, 2);

        let metrics = captured.lock();
        assert_eq!(metrics[0].name, "collectd_disk_disk_octets_read");
        assert_eq!(metrics[1].name, "collectd_disk_disk_octets_write");
        assert_eq!(metrics[0].metric_type, MetricType::Counter);
        assert_eq!(metrics[0].value, 197141504.0);
        assert_eq!(metrics[0].time, 1346867040.2);
        assert_eq!(metrics[0].interval, Duration::from_secs(10));
        assert_eq!(metrics[0].label_keys, vec!["host", "plugin_instance"]);
        assert_eq!(metrics[0].label_vals, vec!["node-1", "sda"]);
    }

    #[tokio::test]
    async fn test_plugin_repeated_as_type_is_not_duplicated() {
        let (handler, captured) = capturing_handler().await;
        let frame = br#"[{
            "values": [42.5],
            "dstypes": ["gauge"],
            "dsnames": ["value"],
            "time": 100.0,
            "interval": 5.0,
            "host": "node-1",
            "plugin": "cpu",
            "plugin_instance": "0",
            "type": "cpu",
            "type_instance": "idle"
        }]"#;

        handler.handle(frame).await.unwrap();

        let metrics = captured.lock();
        assert_eq!(metrics[0].name, "collectd_cpu");
        assert_eq!(metrics[0].metric_type, MetricType::Gauge);
        assert_eq!(
            metrics[0].label_keys,
            vec!["host", "plugin_instance", "type_instance"]
        );
        assert_eq!(metrics[0].label_vals, vec!["node-1", "0", "idle"]);
    }

    #[tokio::test]
    async fn test_null_values_are_skipped() {
        let (handler, captured) = capturing_handler().await;
        let frame = br#"[{
            "values": [null, 5.0],
            "dstypes": ["gauge", "gauge"],
            "dsnames": ["shortterm", "midterm"],
            "time": 100.0,
            "interval": 10.0,
            "host": "node-1",
            "plugin": "load",
            "type": "load"
        }]"#;

        let published = handler.handle(frame).await.unwrap();
        assert_eq!(published, 1);
        assert_eq!(captured.lock()[0].name, "collectd_load_midterm");
    }

    #[tokio::test]
    async fn test_mismatched_dstypes_is_malformed() {
        let (handler, captured) = capturing_handler().await;
        let frame = br#"[{
            "values": [1.0, 2.0],
            "dstypes": ["gauge"],
            "time": 100.0,
            "interval": 10.0,
            "host": "node-1",
            "plugin": "load",
            "type": "load"
        }]"#;

        let err = handler.handle(frame).await.unwrap_err();
        assert!(err.to_string().contains("malformed collectd frame"));
        assert!(captured.lock().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_frame_is_rejected() {
        let (handler, captured) = capturing_handler().await;
        assert!(handler.handle(b"not json at all").await.is_err());
        assert!(captured.lock().is_empty());
    }

    #[tokio::test]
    async fn test_negative_interval_falls_back_to_unset() {
        let (handler, captured) = capturing_handler().await;
        let frame = br#"[{
            "values": [1.0],
            "dstypes": ["gauge"],
            "dsnames": ["value"],
            "time": 100.0,
            "interval": -3.0,
            "host": "node-1",
            "plugin": "load",
            "type": "load"
        }]"#;

        handler.handle(frame).await.unwrap();
        assert_eq!(captured.lock()[0].interval, Duration::ZERO);
    }
}
