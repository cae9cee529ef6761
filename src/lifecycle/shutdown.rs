//! Shutdown coordination.
//!
//! Two coordinators exist at runtime: the process-wide one that `main`
//! triggers on a signal, and one per server that ends its WebSocket
//! sessions once graceful shutdown begins.

use tokio::sync::broadcast;

/// One-shot broadcast; every subscriber sees a single `trigger`.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify current subscribers. Later subscribers are not notified.
    pub fn trigger(&self) {
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::debug!(listeners, "Shutdown triggered");
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
