//! Cancellable one-shot timers.
//!
//! # Design Decisions
//! - Each `start` bumps an epoch and the firing task hands that epoch to the
//!   callback; owners compare it with `is_current` under their own lock, so a
//!   firing that raced with `stop` or a re-arm is recognised as stale
//! - Starting an armed timer re-arms it; stopping an idle timer is a no-op

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

pub(crate) type TimerCallback = Arc<dyn Fn(u64) + Send + Sync>;

pub(crate) struct Timer {
    runtime: Handle,
    callback: TimerCallback,
    epoch: AtomicU64,
    task: Mutex<Option<AbortHandle>>,
}

impl Timer {
    pub(crate) fn new(runtime: Handle, callback: TimerCallback) -> Self {
        Self {
            runtime,
            callback,
            epoch: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    /// Arm the timer, replacing any pending firing.
    pub(crate) fn start(&self, delay: Duration) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let callback = self.callback.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback(epoch);
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub(crate) fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let pending = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pending) = pending {
            pending.abort();
        }
    }

    /// True if `epoch` belongs to the latest `start` and no `stop` followed.
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
