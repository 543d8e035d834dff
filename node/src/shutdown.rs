//! Graceful shutdown for the BRVS loops.
//!
//! Every long-lived task `select!`s on a receiver from [`ShutdownController`]
//! alongside its own work. The trigger is either an OS signal or a call to
//! [`ShutdownController::trigger`], for instance when a sibling loop failed.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// A receiver notified when shutdown is triggered.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for SIGINT or SIGTERM, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
            _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        }

        self.trigger();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
