//! Shared shutdown signal for the relay workers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    running: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation token
///
/// Starts in the running state. [`RunningFlag::stop`] may be called from any
/// thread, including a signal handler thread without a runtime.
#[derive(Debug, Clone)]
pub struct RunningFlag {
    inner: Arc<Inner>,
}

impl RunningFlag {
    /// Create a flag in the running state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                running: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    /// Whether shutdown has not been requested yet
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Request shutdown and wake every task waiting in [`Self::stopped`]
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn stop(&self) -> bool {
        let was_running = self.inner.running.swap(false, Ordering::AcqRel);
        if was_running {
            self.inner.notify.notify_waiters();
        }
        was_running
    }

    /// Resolve once shutdown has been requested
    pub async fn stopped(&self) {
        loop {
            // Register before checking so a concurrent stop() cannot be missed
            let notified = self.inner.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}
