use crate::application::exporter::expiry::{Expirable, ExpireOutcome};
use crate::domain::metric::{Metric, MetricType};
use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::IntGauge;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Entries of one label-group collector, keyed by identity.
pub(crate) type EntryMap = DashMap<String, Arc<MetricEntry>>;

/// Deduplication key: metric name plus the ordered label values. Label keys
/// are deliberately not part of the key; producers that reuse a name with
/// the same values under different keys collapse into one series.
pub(crate) fn identity_key(name: &str, label_vals: &[String]) -> String {
    let mut key =
        String::with_capacity(name.len() + label_vals.iter().map(String::len).sum::<usize>());
    key.push_str(name);
    for val in label_vals {
        key.push_str(val);
    }
    key
}

/// Mutable half of an entry, replaced wholesale on every arrival.
#[derive(Debug, Clone)]
pub(crate) struct Sample {
    pub metric_type: MetricType,
    pub value: f64,
    pub time: f64,
    pub label_vals: Vec<String>,
    pub last_arrival: Instant,
}

/// One live series. Schema (name, label keys, interval) is fixed at
/// creation; the sample is overwritten in place by later arrivals.
pub(crate) struct MetricEntry {
    name: String,
    label_keys: Vec<String>,
    interval: Duration,
    stale_after: Duration,
    sample: Mutex<Sample>,
    scraped: AtomicBool,
    owner: Weak<EntryMap>,
    key: String,
    live_entries: IntGauge,
}

impl MetricEntry {
    pub(crate) fn new(
        metric: &Metric,
        stale_after: Duration,
        owner: Weak<EntryMap>,
        key: String,
        live_entries: IntGauge,
    ) -> Self {
        Self {
            name: metric.name.clone(),
            label_keys: metric.label_keys.clone(),
            interval: metric.interval,
            stale_after,
            sample: Mutex::new(Sample {
                metric_type: metric.metric_type,
                value: metric.value,
                time: metric.time,
                label_vals: metric.label_vals.clone(),
                last_arrival: Instant::now(),
            }),
            scraped: AtomicBool::new(false),
            owner,
            key,
            live_entries,
        }
    }

    /// Overwrite the sample with a fresh arrival and reset its age.
    pub(crate) fn update(&self, metric: &Metric) {
        let mut sample = self.sample.lock();
        sample.metric_type = metric.metric_type;
        sample.value = metric.value;
        sample.time = metric.time;
        sample.label_vals.clone_from(&metric.label_vals);
        sample.last_arrival = Instant::now();
    }

    pub(crate) fn snapshot(&self) -> Sample {
        self.sample.lock().clone()
    }

    /// Record that a scrape has seen this entry. Monotonic; eviction is
    /// gated on it so a series always reaches the reader at least once.
    pub(crate) fn mark_scraped(&self) {
        self.scraped.store(true, Ordering::Release);
    }

    pub(crate) fn was_scraped(&self) -> bool {
        self.scraped.load(Ordering::Acquire)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    fn stale_at(&self, now: Instant) -> bool {
        now.duration_since(self.sample.lock().last_arrival) >= self.stale_after
    }
}

impl Expirable for MetricEntry {
    fn is_expired(&self) -> bool {
        self.stale_at(Instant::now())
    }

    fn on_expire(&self) -> ExpireOutcome {
        let Some(owner) = self.owner.upgrade() else {
            // The whole collector is gone; nothing left to unlink.
            self.live_entries.dec();
            return ExpireOutcome::Released;
        };
        if !self.was_scraped() {
            // Stale but never exported; stay registered until a scrape
            // has seen the final value.
            return ExpireOutcome::Retained;
        }
        owner.remove(&self.key);
        self.live_entries.dec();
        ExpireOutcome::Released
    }
}
