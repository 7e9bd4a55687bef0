//! Graceful shutdown controller for the cohort node.
//!
//! Listens for SIGINT/SIGTERM and broadcasts a shutdown signal to all
//! subsystems via a `tokio::sync::broadcast` channel.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across all node subsystems.
///
/// Subsystems call [`subscribe`](Self::subscribe) to get a receiver, then
/// `select!` on it alongside their main loop, or hand
/// [`signal`](Self::signal) to a server as its graceful-shutdown future.
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

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// A future that completes once shutdown is triggered.
    ///
    /// Subscribes immediately, so a shutdown triggered after this call and
    /// before the first poll is not missed.
    pub fn signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for SIGTERM, SIGINT or a programmatic shutdown, then notify every
    /// subscriber.
    pub async fn wait_for_signal(&self) {
        let mut programmatic = self.subscribe();
        if self.is_shutdown() {
            return;
        }

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
            _ = programmatic.recv() => { return; }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx1 = controller.subscribe();
        let mut rx2 = controller.subscribe();
        controller.shutdown();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
        assert!(controller.is_shutdown());
    }

    #[tokio::test]
    async fn signal_future_completes_on_shutdown() {
        let controller = ShutdownController::new();
        let signal = controller.signal();
        controller.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), signal)
            .await
            .expect("signal should resolve");
    }

    #[tokio::test]
    async fn wait_for_signal_returns_on_programmatic_shutdown() {
        let controller = std::sync::Arc::new(ShutdownController::new());
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_for_signal().await })
        };
        tokio::task::yield_now().await;
        controller.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
