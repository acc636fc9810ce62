// Staleness engine: Expirable contract + sweep registries
pub mod expiry;

// One live series and its identity
mod entry;

// One label-count group exposed as a prometheus collector
mod collector;

// The metric-consuming application and its export surface
pub mod collector_set;

// Gateway self-instrumentation
pub mod telemetry;

pub use collector_set::{CollectorSet, ExporterOptions, MetricSchema};
pub use expiry::{Expirable, ExpireOutcome, ExpiryRegistry};
