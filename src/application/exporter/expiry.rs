use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// What an expiry callback did with its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// The handle cleaned itself up; the registry forgets it.
    Released,
    /// The handle is stale but not yet removable; re-examine it next sweep.
    Retained,
}

/// Anything the registry can age out.
///
/// `is_expired` must be cheap, it runs for every handle on every sweep.
/// `on_expire` must not panic; a panic is logged and the handle is kept so
/// a later sweep can retry.
pub trait Expirable: Send + Sync {
    fn is_expired(&self) -> bool;
    fn on_expire(&self) -> ExpireOutcome;
}

/// Holds expirable handles and periodically drops the ones that report
/// expired and release themselves. One registry exists per distinct sweep
/// cadence, so short-lived series get checked more often than slow ones.
pub struct ExpiryRegistry {
    handles: Mutex<Vec<Arc<dyn Expirable>>>,
    cadence: Duration,
}

impl ExpiryRegistry {
    pub fn new(cadence: Duration) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            cadence,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn register(&self, handle: Arc<dyn Expirable>) {
        self.handles.lock().push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Run one pass: ask every handle whether it expired, let expired ones
    /// act, and forget those that released themselves.
    pub fn sweep(&self) {
        self.handles.lock().retain(|handle| {
            if !handle.is_expired() {
                return true;
            }
            match catch_unwind(AssertUnwindSafe(|| handle.on_expire())) {
                Ok(ExpireOutcome::Released) => false,
                Ok(ExpireOutcome::Retained) => true,
                Err(_) => {
                    error!("expiry callback panicked; handle kept for a later sweep");
                    true
                }
            }
        });
    }

    /// Sweep on a fixed cadence until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep(),
                _ = cancel.cancelled() => {
                    debug!("expiry sweep loop stopped ({:?} cadence)", self.cadence);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubHandle {
        expired: AtomicBool,
        release: AtomicBool,
        fired: AtomicUsize,
    }

    impl StubHandle {
        fn new(expired: bool, release: bool) -> Arc<Self> {
            Arc::new(Self {
                expired: AtomicBool::new(expired),
                release: AtomicBool::new(release),
                fired: AtomicUsize::new(0),
            })
        }
    }

    impl Expirable for StubHandle {
        fn is_expired(&self) -> bool {
            self.expired.load(Ordering::SeqCst)
        }

        fn on_expire(&self) -> ExpireOutcome {
            self.fired.fetch_add(1, Ordering::SeqCst);
            if self.release.load(Ordering::SeqCst) {
                ExpireOutcome::Released
            } else {
                ExpireOutcome::Retained
            }
        }
    }

    struct PanickingHandle;

    impl Expirable for PanickingHandle {
        fn is_expired(&self) -> bool {
            true
        }

        fn on_expire(&self) -> ExpireOutcome {
            panic!("callback blew up");
        }
    }

    #[test]
    fn test_sweep_releases_expired_handles() {
        let registry = ExpiryRegistry::new(Duration::from_secs(1));
        let live = StubHandle::new(false, true);
        let stale = StubHandle::new(true, true);
        registry.register(live.clone());
        registry.register(stale.clone());

        registry.sweep();

        assert_eq!(registry.len(), 1);
        assert_eq!(live.fired.load(Ordering::SeqCst), 0);
        assert_eq!(stale.fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retained_handles_are_reexamined_next_sweep() {
        let registry = ExpiryRegistry::new(Duration::from_secs(1));
        let handle = StubHandle::new(true, false);
        registry.register(handle.clone());

        registry.sweep();
        assert_eq!(registry.len(), 1);

        // Once the handle agrees to go, the next sweep drops it.
        handle.release.store(true, Ordering::SeqCst);
        registry.sweep();
        assert_eq!(registry.len(), 0);
        assert_eq!(handle.fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_does_not_abort_the_sweep() {
        let registry = ExpiryRegistry::new(Duration::from_secs(1));
        let stale = StubHandle::new(true, true);
        registry.register(Arc::new(PanickingHandle));
        registry.register(stale.clone());

        registry.sweep();

        // The panicker stays for a retry, the well-behaved handle is gone.
        assert_eq!(registry.len(), 1);
        assert_eq!(stale.fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_until_cancelled() {
        let registry = Arc::new(ExpiryRegistry::new(Duration::from_secs(10)));
        let handle = StubHandle::new(true, false);
        registry.register(handle.clone());

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(Arc::clone(&registry).run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert!(handle.fired.load(Ordering::SeqCst) >= 3);

        cancel.cancel();
        worker.await.unwrap();
        assert_eq!(registry.len(), 1);
    }
}
