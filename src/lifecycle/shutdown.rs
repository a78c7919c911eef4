//! Shutdown coordination for background loops.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

/// Coordinator for graceful shutdown.
///
/// Every health monitor and the status publisher subscribe to the same
/// broadcast channel. The admin server waits on a latched flag, so a trigger
/// that fires before it starts waiting is still observed.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        let (fired, _) = watch::channel(false);
        Self {
            tx,
            fired: Arc::new(fired),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.fired.send_replace(true);
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        *self.fired.borrow()
    }

    /// Number of loops still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolve once the signal has fired, including before this call.
    /// Used as an axum graceful-shutdown future.
    pub async fn wait(&self) {
        let mut rx = self.fired.subscribe();
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
