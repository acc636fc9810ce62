pub mod bus;
pub mod handlers;
pub mod transports;

pub use bus::{Bus, EventBus, MetricBus};
