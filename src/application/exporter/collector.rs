use crate::application::exporter::entry::{EntryMap, MetricEntry, identity_key};
use crate::application::exporter::telemetry::Telemetry;
use crate::domain::metric::{Metric, MetricType};
use dashmap::mapref::entry::Entry;
use prometheus::core::{Collector, Desc};
use prometheus::proto;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::warn;

const FAMILY_HELP: &str = "Metric relayed by the telemetry gateway";

/// All live series that share a label count, exposed to the scrape
/// registry as a single collector.
///
/// The registry derives collector identity from descriptors, and the real
/// series here come and go at runtime, so each group registers one stable
/// synthetic anchor descriptor and emits the actual families from
/// `collect`. The anchor carries a sequence number: a retired group that is
/// still unregistering must never match the descriptor of its successor.
pub(crate) struct LabelGroupCollector {
    dimension: usize,
    desc: Desc,
    entries: Arc<EntryMap>,
    with_timestamp: bool,
    telemetry: Telemetry,
}

impl LabelGroupCollector {
    pub(crate) fn new(
        dimension: usize,
        seq: u64,
        with_timestamp: bool,
        telemetry: Telemetry,
    ) -> prometheus::Result<Self> {
        let desc = Desc::new(
            format!("telegate_labelset_{dimension}_{seq}"),
            format!("Anchor for relayed metrics carrying {dimension} labels"),
            Vec::new(),
            HashMap::new(),
        )?;
        Ok(Self {
            dimension,
            desc,
            entries: Arc::new(EntryMap::new()),
            with_timestamp,
            telemetry,
        })
    }

    pub(crate) fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &Arc<EntryMap> {
        &self.entries
    }

    /// Insert or refresh the series identified by the metric. Returns the
    /// entry only when this arrival created it, so the caller can register
    /// it for expiry exactly once.
    pub(crate) fn upsert(&self, metric: &Metric, stale_after: Duration) -> Option<Arc<MetricEntry>> {
        debug_assert_eq!(metric.dimension(), self.dimension);
        match self.entries.entry(identity_key(&metric.name, &metric.label_vals)) {
            Entry::Occupied(occupied) => {
                occupied.get().update(metric);
                None
            }
            Entry::Vacant(vacant) => {
                let key = vacant.key().clone();
                let entry = Arc::new(MetricEntry::new(
                    metric,
                    stale_after,
                    Arc::downgrade(&self.entries),
                    key,
                    self.telemetry.entries_tracked.clone(),
                ));
                vacant.insert(Arc::clone(&entry));
                self.telemetry.entries_tracked.inc();
                Some(entry)
            }
        }
    }

    /// Render every live entry as a one-sample family, marking each as
    /// scraped so the staleness sweeps may unlink it later.
    pub(crate) fn collect_families(&self) -> Vec<proto::MetricFamily> {
        let mut families = Vec::with_capacity(self.entries.len());
        for item in self.entries.iter() {
            let entry = item.value();
            entry.mark_scraped();
            let sample = entry.snapshot();

            if sample.label_vals.len() != entry.label_keys().len() {
                warn!(
                    "skipping scrape of '{}': {} label values against {} keys",
                    entry.name(),
                    sample.label_vals.len(),
                    entry.label_keys().len()
                );
                self.telemetry.scrape_skips.inc();
                continue;
            }

            let mut metric = proto::Metric::default();
            for (key, val) in entry.label_keys().iter().zip(sample.label_vals.iter()) {
                let mut pair = proto::LabelPair::default();
                pair.set_name(key.clone());
                pair.set_value(val.clone());
                metric.mut_label().push(pair);
            }
            let family_type = match sample.metric_type {
                MetricType::Counter => {
                    let mut counter = proto::Counter::default();
                    counter.set_value(sample.value);
                    metric.set_counter(counter);
                    proto::MetricType::COUNTER
                }
                MetricType::Gauge => {
                    let mut gauge = proto::Gauge::default();
                    gauge.set_value(sample.value);
                    metric.set_gauge(gauge);
                    proto::MetricType::GAUGE
                }
                MetricType::Untyped => {
                    let mut untyped = proto::Untyped::default();
                    untyped.set_value(sample.value);
                    metric.set_untyped(untyped);
                    proto::MetricType::UNTYPED
                }
            };
            // time == 0.0 means the producer never stamped the sample; let
            // the scraper assign its own timestamp instead.
            if self.with_timestamp && sample.time > 0.0 {
                metric.set_timestamp_ms((sample.time * 1000.0) as i64);
            }

            let mut family = proto::MetricFamily::default();
            family.set_name(entry.name().to_string());
            family.set_help(FAMILY_HELP.to_string());
            family.set_field_type(family_type);
            family.mut_metric().push(metric);
            families.push(family);
        }
        families
    }
}

/// Registration token handed to the scrape registry. Register and
/// unregister match on the anchor descriptor, so any handle around the
/// same group instance is interchangeable.
pub(crate) struct CollectorHandle(pub(crate) Arc<LabelGroupCollector>);

impl Collector for CollectorHandle {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.0.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        self.0.collect_families()
    }
}

/// Expiry handle for a whole label group: once its last entry is gone the
/// group unlinks itself from the collector table and the scrape registry.
pub(crate) struct CollectorExpiry {
    pub(crate) dimension: usize,
    pub(crate) collectors: Weak<dashmap::DashMap<usize, Arc<LabelGroupCollector>>>,
    pub(crate) registry: prometheus::Registry,
    pub(crate) collector: Weak<LabelGroupCollector>,
}

impl crate::application::exporter::expiry::Expirable for CollectorExpiry {
    fn is_expired(&self) -> bool {
        match self.collector.upgrade() {
            Some(collector) => collector.is_empty(),
            None => true,
        }
    }

    fn on_expire(&self) -> crate::application::exporter::expiry::ExpireOutcome {
        use crate::application::exporter::expiry::ExpireOutcome;

        let Some(collectors) = self.collectors.upgrade() else {
            return ExpireOutcome::Released;
        };
        let Some(collector) = self.collector.upgrade() else {
            return ExpireOutcome::Released;
        };

        // Shard-atomic check-and-remove: a metric that landed between the
        // emptiness probe and this call keeps the group installed, and a
        // successor group under the same dimension is never touched.
        let removed = collectors.remove_if(&self.dimension, |_, installed| {
            Arc::ptr_eq(installed, &collector) && installed.is_empty()
        });
        if removed.is_none() {
            return ExpireOutcome::Retained;
        }

        if let Err(err) = self
            .registry
            .unregister(Box::new(CollectorHandle(collector)))
        {
            warn!(
                "failed to unregister drained {}-label collector: {}",
                self.dimension, err
            );
        }
        ExpireOutcome::Released
    }
}
