use crate::application::exporter::collector::{
    CollectorExpiry, CollectorHandle, LabelGroupCollector,
};
use crate::application::exporter::expiry::ExpiryRegistry;
use crate::application::exporter::telemetry::Telemetry;
use crate::domain::metric::Metric;
use crate::domain::ports::Subscriber;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use prometheus::{Registry, TextEncoder, proto};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Tuning knobs for the metric export pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ExporterOptions {
    /// Staleness window = declared interval times this multiple.
    pub expiration_multiple: u32,
    /// Attach source timestamps to exported samples.
    pub with_timestamp: bool,
    /// Cadence of the sweep that retires drained label groups.
    pub collector_sweep: Duration,
    /// Stand-in for a zero declared interval.
    pub default_interval: Duration,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            expiration_multiple: 2,
            with_timestamp: false,
            collector_sweep: Duration::from_secs(10),
            default_interval: Duration::from_secs(10),
        }
    }
}

/// Schema of one live series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSchema {
    pub name: String,
    pub label_keys: Vec<String>,
    pub interval: Duration,
}

/// The metric-consuming application: every received sample lands in the
/// label group matching its label count, stays as long as samples keep
/// arriving, and leaves through staleness sweeps once the scrape side has
/// seen it. Groups themselves are retired once drained.
pub struct CollectorSet {
    options: ExporterOptions,
    collectors: Arc<DashMap<usize, Arc<LabelGroupCollector>>>,
    interval_registries: DashMap<Duration, Arc<ExpiryRegistry>>,
    collector_registry: Arc<ExpiryRegistry>,
    registry: Registry,
    telemetry: Telemetry,
    collector_seq: AtomicU64,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CollectorSet {
    pub fn new(options: ExporterOptions, cancel: CancellationToken) -> anyhow::Result<Self> {
        let registry = Registry::new();
        let telemetry = Telemetry::new(&registry)?;
        Ok(Self {
            options,
            collectors: Arc::new(DashMap::new()),
            interval_registries: DashMap::new(),
            collector_registry: Arc::new(ExpiryRegistry::new(options.collector_sweep)),
            registry,
            telemetry,
            collector_seq: AtomicU64::new(0),
            cancel,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the sweep that retires drained label groups. Interval sweeps
    /// spawn lazily as metrics declare their intervals.
    pub fn start(&self) {
        let task = tokio::spawn(
            Arc::clone(&self.collector_registry).run(self.cancel.child_token()),
        );
        self.tasks.lock().push(task);
    }

    /// Ingest one metric. Never fails: bad input is counted and dropped,
    /// everything else lands in the model.
    pub fn receive_metric(&self, metric: Metric) {
        self.telemetry.metrics_received.inc();

        if !metric.labels_consistent() {
            warn!(
                "rejecting metric '{}': {} label keys against {} values",
                metric.name,
                metric.label_keys.len(),
                metric.label_vals.len()
            );
            self.telemetry.samples_rejected.inc();
            return;
        }

        let dimension = metric.dimension();
        let interval = if metric.interval.is_zero() {
            self.options.default_interval
        } else {
            metric.interval
        };
        let stale_after = interval * self.options.expiration_multiple.max(1);

        loop {
            let (collector, created) = match self.collectors.entry(dimension) {
                Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
                Entry::Vacant(vacant) => {
                    let seq = self.collector_seq.fetch_add(1, Ordering::Relaxed);
                    match LabelGroupCollector::new(
                        dimension,
                        seq,
                        self.options.with_timestamp,
                        self.telemetry.clone(),
                    ) {
                        Ok(collector) => {
                            let collector = Arc::new(collector);
                            vacant.insert(Arc::clone(&collector));
                            (collector, true)
                        }
                        Err(err) => {
                            warn!(
                                "cannot create collector for {}-label metrics: {}",
                                dimension, err
                            );
                            self.telemetry.samples_rejected.inc();
                            return;
                        }
                    }
                }
            };
            if created {
                self.install(dimension, &collector);
            }

            if let Some(entry) = collector.upsert(&metric, stale_after) {
                self.registry_for(interval).register(entry);
            }

            // A sweep may have retired the group between lookup and insert;
            // remove-if-empty guarantees it was empty when it went, so one
            // retry against a fresh group suffices for this arrival.
            match self.collectors.get(&dimension) {
                Some(installed) if Arc::ptr_eq(installed.value(), &collector) => return,
                _ => {
                    debug!("{}-label collector retired mid-insert; retrying", dimension);
                    continue;
                }
            }
        }
    }

    /// Register a fresh group with the scrape registry and the retirement
    /// sweep. Anchor descriptors are sequenced, so a predecessor that is
    /// still unregistering can never collide with or evict this one.
    fn install(&self, dimension: usize, collector: &Arc<LabelGroupCollector>) {
        if let Err(err) = self
            .registry
            .register(Box::new(CollectorHandle(Arc::clone(collector))))
        {
            warn!("failed to register {}-label collector: {}", dimension, err);
        }
        self.collector_registry.register(Arc::new(CollectorExpiry {
            dimension,
            collectors: Arc::downgrade(&self.collectors),
            registry: self.registry.clone(),
            collector: Arc::downgrade(collector),
        }));
    }

    /// Expiry registry for one declared interval, sweeping at that same
    /// cadence; created and its loop spawned on first use.
    fn registry_for(&self, interval: Duration) -> Arc<ExpiryRegistry> {
        match self.interval_registries.entry(interval) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => {
                let registry = Arc::new(ExpiryRegistry::new(interval));
                vacant.insert(Arc::clone(&registry));
                let task =
                    tokio::spawn(Arc::clone(&registry).run(self.cancel.child_token()));
                self.tasks.lock().push(task);
                registry
            }
        }
    }

    /// Schema of every live series.
    pub fn describe(&self) -> Vec<MetricSchema> {
        let mut schemas = Vec::new();
        for group in self.collectors.iter() {
            for item in group.value().entries().iter() {
                let entry = item.value();
                schemas.push(MetricSchema {
                    name: entry.name().to_string(),
                    label_keys: entry.label_keys().to_vec(),
                    interval: entry.interval(),
                });
            }
        }
        schemas
    }

    /// The scrape registry serving both relayed series and self-telemetry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    pub fn entry_count(&self) -> usize {
        self.collectors.iter().map(|group| group.value().len()).sum()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Wait for the sweep loops to finish after cancellation, up to `grace`.
    pub async fn drain(&self, grace: Duration) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        if tokio::time::timeout(grace, futures_util::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("exporter sweep loops did not stop within {:?}", grace);
        }
    }
}

#[async_trait]
impl Subscriber<Metric> for CollectorSet {
    fn id(&self) -> &str {
        "metric-exporter"
    }

    async fn receive(&self, payload: Metric) {
        self.receive_metric(payload);
    }
}
