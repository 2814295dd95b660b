//! One-shot shutdown signal.
//!
//! Clones share the same state: once any clone fires, every clone observes
//! it forever.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation source.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create a signal that has not fired yet.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal.
    ///
    /// Returns `true` if this call fired it, `false` if it had already fired.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Check if the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_one_shot() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        clone.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_wakes_waiter() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };

        tokio::task::yield_now().await;
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_triggered_returns_when_already_fired() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.triggered())
            .await
            .expect("already fired signal should not wait");
    }
}
