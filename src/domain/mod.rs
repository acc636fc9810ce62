// Domain-specific error types
pub mod errors;

// Event payloads and severities
pub mod event;

// Metric payloads and schemas
pub mod metric;

// Port interfaces
pub mod ports;
