//! Cooperative shutdown signal shared by the run loop and the executor

use tokio::sync::watch;

/// Sending half. Triggering, or dropping every trigger, shuts down all
/// subscribed `Shutdown` handles.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

/// Receiving half, cheap to clone
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// Create a connected trigger / handle pair
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, Shutdown { receiver })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left is fine: nothing to stop
        let _ = self.sender.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Shutdown {
    /// Non-blocking check
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Resolves once shutdown is requested
    pub async fn triggered(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let (trigger, mut shutdown) = shutdown_channel();
        let mut other = trigger.subscribe();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move {
            other.triggered().await;
        });

        trigger.trigger();
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);
        assert!(shutdown.is_triggered());
        shutdown.triggered().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_triggered() {
        let (_trigger, mut shutdown) = shutdown_channel();
        let result = tokio::time::timeout(Duration::from_secs(5), shutdown.triggered()).await;
        assert!(result.is_err());
    }
}
