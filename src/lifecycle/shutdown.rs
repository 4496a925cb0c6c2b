//! Shutdown coordination for the servers.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// A future that resolves once [`trigger`](Self::trigger) is called.
    ///
    /// Subscribes immediately, so a trigger issued after this call but
    /// before the first poll is not missed. Suitable for
    /// `with_graceful_shutdown`.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            // A closed channel means the coordinator is gone; stop as well.
            let _ = rx.recv().await;
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_every_subscriber() {
        let shutdown = Shutdown::new();
        let first = shutdown.signalled();
        let second = shutdown.signalled();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await;
            second.await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn pending_until_triggered() {
        let shutdown = Shutdown::new();
        let signalled = shutdown.signalled();
        assert!(tokio::time::timeout(Duration::from_millis(20), signalled)
            .await
            .is_err());
    }
}
