// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown (docker stop / orchestrator)
// - SIGINT:  Graceful shutdown (Ctrl+C)
//
// Configuration reload is intentionally absent: the route table is fixed
// for the life of the process, and rollouts replace the process on the
// shared port instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shutdown coordination state
pub struct ShutdownSignal {
    /// Notified once when shutdown is requested
    pub notify: Arc<Notify>,
    /// Whether shutdown has been requested
    pub requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
///
/// Spawns a background task that waits for SIGTERM/SIGINT and flips the
/// shutdown state; the accept loop observes it and stops taking work.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<ShutdownSignal>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                logger_note("SIGTERM");
            }
            _ = sigint.recv() => {
                logger_note("SIGINT (Ctrl+C)");
            }
        }

        shutdown.requested.store(true, Ordering::SeqCst);
        shutdown.notify.notify_waiters();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<ShutdownSignal>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger_note("Ctrl+C");
            shutdown.requested.store(true, Ordering::SeqCst);
            shutdown.notify.notify_waiters();
        }
    });
}

fn logger_note(which: &str) {
    crate::logger::log_warning(&format!("{which} received, initiating graceful shutdown"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_wakes_waiter() {
        let shutdown = Arc::new(ShutdownSignal::new());
        let waiter = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            waiter.notify.notified().await;
            waiter.requested.load(Ordering::SeqCst)
        });

        // Let the waiter register before signalling
        tokio::task::yield_now().await;
        shutdown.requested.store(true, Ordering::SeqCst);
        shutdown.notify.notify_waiters();

        assert!(handle.await.unwrap());
    }
}
