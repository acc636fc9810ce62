use crate::domain::event::{Event, EventSeverity};
use crate::domain::ports::Subscriber;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

/// Event-consuming application: writes every bus event to the process log
/// at the level matching its severity.
pub struct EventLog {
    seen: AtomicU64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            seen: AtomicU64::new(0),
        }
    }

    /// Events consumed since startup.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    fn log(&self, event: &Event) {
        match event.severity {
            EventSeverity::Critical => error!(
                index = %event.index,
                kind = %event.event_type,
                publisher = %event.publisher,
                time = event.time,
                "event received"
            ),
            EventSeverity::Warning => warn!(
                index = %event.index,
                kind = %event.event_type,
                publisher = %event.publisher,
                time = event.time,
                "event received"
            ),
            EventSeverity::Info | EventSeverity::Unknown => info!(
                index = %event.index,
                kind = %event.event_type,
                publisher = %event.publisher,
                time = event.time,
                "event received"
            ),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscriber<Event> for EventLog {
    fn id(&self) -> &str {
        "event-log"
    }

    async fn receive(&self, payload: Event) {
        self.log(&payload);
        self.seen.fetch_add(1, Ordering::Relaxed);
    }
}
