use crate::domain::event::Event;
use crate::domain::metric::Metric;
use crate::domain::ports::Subscriber;
use futures_util::FutureExt;
use prometheus::IntCounter;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How `publish` relates to subscriber execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Hand payloads to per-subscriber workers; `publish` returns once queued.
    NonBlocking,
    /// Run every subscriber inline, in subscription order, before returning.
    Blocking,
}

/// What a non-blocking `publish` does when a subscriber queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for space; publishers feel backpressure but nothing is lost.
    Block,
    /// Drop the incoming payload for that subscriber and count it.
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop-newest" | "drop_newest" => Ok(OverflowPolicy::DropNewest),
            other => anyhow::bail!("unknown overflow policy: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BusOptions {
    pub mode: DispatchMode,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            mode: DispatchMode::NonBlocking,
            queue_capacity: 256,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Delivery state for one subscriber. The queue is `None` in blocking mode.
struct Slot<T> {
    subscriber: Arc<dyn Subscriber<T>>,
    queue: Option<mpsc::Sender<T>>,
}

/// Typed fan-out bus carrying one payload kind to any number of subscribers.
///
/// Every subscriber sees every payload. In non-blocking mode each subscriber
/// gets a bounded queue drained by its own worker task, so one slow consumer
/// cannot stall the others; a panicking consumer costs only the payload it
/// panicked on.
pub struct Bus<T: Clone + Send + 'static> {
    name: &'static str,
    options: BusOptions,
    slots: Arc<RwLock<Vec<Slot<T>>>>,
    dropped: IntCounter,
    cancel: CancellationToken,
}

pub type MetricBus = Bus<Metric>;
pub type EventBus = Bus<Event>;

impl<T: Clone + Send + 'static> Bus<T> {
    /// Create a new bus. The token parents every worker this bus spawns;
    /// the counter records payloads shed under the drop-newest policy.
    pub fn new(
        name: &'static str,
        options: BusOptions,
        cancel: CancellationToken,
        dropped: IntCounter,
    ) -> Self {
        Self {
            name,
            options,
            slots: Arc::new(RwLock::new(Vec::new())),
            dropped,
            cancel,
        }
    }

    /// Subscribe a consumer; in non-blocking mode this spawns its worker.
    pub async fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let queue = match self.options.mode {
            DispatchMode::Blocking => None,
            DispatchMode::NonBlocking => {
                let (tx, rx) = mpsc::channel(self.options.queue_capacity.max(1));
                self.spawn_worker(Arc::clone(&subscriber), rx);
                Some(tx)
            }
        };
        self.slots.write().await.push(Slot { subscriber, queue });
    }

    /// Publish a payload to all current subscribers.
    pub async fn publish(&self, payload: T) {
        let slots = self.slots.read().await;
        match self.options.mode {
            DispatchMode::Blocking => {
                for slot in slots.iter() {
                    deliver(self.name, slot.subscriber.as_ref(), payload.clone()).await;
                }
            }
            DispatchMode::NonBlocking => {
                for slot in slots.iter() {
                    let Some(queue) = &slot.queue else { continue };
                    match self.options.overflow {
                        OverflowPolicy::Block => {
                            if queue.send(payload.clone()).await.is_err() {
                                warn!(
                                    "{} bus: worker for '{}' is gone, payload lost",
                                    self.name,
                                    slot.subscriber.id()
                                );
                            }
                        }
                        OverflowPolicy::DropNewest => match queue.try_send(payload.clone()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                self.dropped.inc();
                                debug!(
                                    "{} bus: queue full for '{}', payload dropped",
                                    self.name,
                                    slot.subscriber.id()
                                );
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                warn!(
                                    "{} bus: worker for '{}' is gone, payload lost",
                                    self.name,
                                    slot.subscriber.id()
                                );
                            }
                        },
                    }
                }
            }
        }
    }

    fn spawn_worker(&self, subscriber: Arc<dyn Subscriber<T>>, mut rx: mpsc::Receiver<T>) {
        let bus = self.name;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let payload = tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(payload) => payload,
                        None => break,
                    },
                    _ = cancel.cancelled() => {
                        // Drain what is already queued, then stop.
                        while let Ok(payload) = rx.try_recv() {
                            deliver(bus, subscriber.as_ref(), payload).await;
                        }
                        break;
                    }
                };
                deliver(bus, subscriber.as_ref(), payload).await;
            }
            debug!("{} bus: worker for '{}' stopped", bus, subscriber.id());
        });
    }

    /// Get count of subscribers (for testing)
    pub async fn subscriber_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Payloads discarded under the drop-newest policy since startup.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.get()
    }
}

async fn deliver<T: Send + 'static>(bus: &str, subscriber: &dyn Subscriber<T>, payload: T) {
    if AssertUnwindSafe(subscriber.receive(payload))
        .catch_unwind()
        .await
        .is_err()
    {
        error!(
            "{} bus: subscriber '{}' panicked while handling a payload",
            bus,
            subscriber.id()
        );
    }
}

impl<T: Clone + Send + 'static> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            options: self.options,
            slots: Arc::clone(&self.slots),
            dropped: self.dropped.clone(),
            cancel: self.cancel.clone(),
        }
    }
}
