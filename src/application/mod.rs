// Event-consuming application (structured log sink)
pub mod event_log;

// Metric-consuming application (aggregation + prometheus export)
pub mod exporter;

// System orchestrator
pub mod system;
