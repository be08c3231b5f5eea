//! Shutdown coordination for the traffic generator.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Receivers created before [`Shutdown::trigger`] keep the signal buffered, so
/// a worker busy with a request still observes it at its next loop iteration.
#[derive(Clone)]
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

/// Returns true once the signal was sent or the coordinator is gone.
pub fn is_triggered(rx: &mut broadcast::Receiver<()>) -> bool {
    use broadcast::error::TryRecvError;

    match rx.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Empty) => false,
        Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_buffered_for_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert!(!is_triggered(&mut rx));

        shutdown.trigger();
        assert!(is_triggered(&mut rx));
    }

    #[test]
    fn test_dropped_coordinator_counts_as_triggered() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);

        drop(shutdown);
        assert!(is_triggered(&mut rx));
    }
}
