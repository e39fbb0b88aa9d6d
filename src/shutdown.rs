//! Cooperative cancellation for a download run.
//!
//! A [`ShutdownCoordinator`] is shared between the Ctrl+C handler and the
//! orchestrator. Every sleep the orchestrator performs races the coordinator,
//! so a one-hour cooldown can be interrupted immediately.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Register the process-wide handle installed by the binary.
pub fn set_global_shutdown(handle: SharedShutdown) {
    let _ = GLOBAL_SHUTDOWN.set(handle);
}

/// Process-wide handle, if the binary registered one.
pub fn get_global_shutdown() -> Option<SharedShutdown> {
    GLOBAL_SHUTDOWN.get().cloned()
}

/// Coordinates cancellation across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request cancellation. Waiters are woken once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed, `false` on cancellation.
    pub async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        if self.is_shutdown_requested() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutdown_requested(),
            _ = self.wait_for_shutdown() => false,
        }
    }
}

/// Sleep that honours an optional coordinator.
pub async fn sleep_unless_cancelled(shutdown: Option<&SharedShutdown>, duration: Duration) -> bool {
    match shutdown {
        Some(shutdown) => shutdown.sleep_or_shutdown(duration).await,
        None => {
            tokio::time::sleep(duration).await;
            true
        }
    }
}
