//! Gateway self-instrumentation, exported on the same registry as the
//! relayed series. All metrics use the `telegate_` prefix.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Counters and gauges describing the gateway itself.
#[derive(Clone)]
pub struct Telemetry {
    /// Metrics that entered the receive pipeline
    pub metrics_received: IntCounter,
    /// Samples refused before insertion (label arity mismatch)
    pub samples_rejected: IntCounter,
    /// Live series currently held across all label groups
    pub entries_tracked: IntGauge,
    /// Samples skipped at scrape time (arity drifted after insertion)
    pub scrape_skips: IntCounter,
    /// Payloads shed by bounded bus queues, per bus
    pub bus_dropped: IntCounterVec,
}

impl Telemetry {
    /// Create the gateway self-metrics and register them.
    pub fn new(registry: &Registry) -> anyhow::Result<Self> {
        let metrics_received = IntCounter::with_opts(Opts::new(
            "telegate_metrics_received_total",
            "Metrics that entered the receive pipeline",
        ))?;
        registry.register(Box::new(metrics_received.clone()))?;

        let samples_rejected = IntCounter::with_opts(Opts::new(
            "telegate_samples_rejected_total",
            "Samples refused for label arity mismatch",
        ))?;
        registry.register(Box::new(samples_rejected.clone()))?;

        let entries_tracked = IntGauge::with_opts(Opts::new(
            "telegate_entries_tracked",
            "Live series currently held across all label groups",
        ))?;
        registry.register(Box::new(entries_tracked.clone()))?;

        let scrape_skips = IntCounter::with_opts(Opts::new(
            "telegate_scrape_skips_total",
            "Samples skipped at scrape time",
        ))?;
        registry.register(Box::new(scrape_skips.clone()))?;

        let bus_dropped = IntCounterVec::new(
            Opts::new(
                "telegate_bus_dropped_total",
                "Payloads shed by bounded bus queues",
            ),
            &["bus"],
        )?;
        registry.register(Box::new(bus_dropped.clone()))?;

        Ok(Self {
            metrics_received,
            samples_rejected,
            entries_tracked,
            scrape_skips,
            bus_dropped,
        })
    }

    /// Build the same set against a throwaway registry (for testing)
    #[cfg(test)]
    pub(crate) fn unregistered() -> Self {
        Self::new(&Registry::new()).expect("telemetry construction is infallible")
    }
}
