//! Message broker.
//!
//! Producers submit messages into a bounded inbound queue. A single routing
//! loop drains the queue and fans each message out to one or all registered
//! subscribers using non-blocking pushes, so a stuck subscriber can never
//! stall the loop or the other subscribers.
//!
//! ```text
//! producers ──send_message──▶ inbound queue ──run──▶ registry ──try_send──▶ endpoints
//! ```
//!
//! Lifecycle is `Open → Closing → Closed`. Either the external
//! [`ShutdownSignal`] or [`Broker::shutdown`] moves the broker to `Closing`;
//! it becomes `Closed` once the routing loop has observed that and exited.
//! The broker cannot be restarted.

use crate::config::BrokerConfig;
use crate::message::{Message, SubscriberId};
use crate::metrics;
use crate::registry::{self, Endpoint, Inbox, Registry};
use crate::shutdown::ShutdownSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Broker errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The broker has been shut down and accepts no more messages.
    #[error("broker is offline")]
    Closed,
}

/// Lifecycle state of a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    /// Accepting and routing messages.
    Open,
    /// Termination fired; the routing loop has not exited yet.
    Closing,
    /// The routing loop has exited.
    Closed,
}

/// Broker statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Messages accepted into the inbound queue.
    pub accepted: u64,
    /// Submissions refused because the broker was closed.
    pub rejected: u64,
    /// Messages taken off the queue and routed.
    pub routed: u64,
    /// Copies pushed to subscriber endpoints.
    pub delivered: u64,
    /// Copies dropped on full or closed endpoints.
    pub dropped: u64,
    /// Direct messages whose recipient was not registered.
    pub unroutable: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    routed: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    unroutable: AtomicU64,
}

/// In-memory chat message broker.
///
/// Share it behind an `Arc` and spawn [`Broker::run`] on its own task.
pub struct Broker {
    config: BrokerConfig,
    registry: Arc<Registry>,
    inbound_tx: mpsc::Sender<Message>,
    /// Taken by the first call to `run`.
    inbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    /// External cancellation source.
    cancel: ShutdownSignal,
    /// Fired by `shutdown`; private to this broker.
    done: ShutdownSignal,
    closed: AtomicBool,
    counters: Counters,
}

impl Broker {
    /// Create a broker with default configuration.
    #[must_use]
    pub fn new(cancel: ShutdownSignal) -> Self {
        Self::with_config(BrokerConfig::default(), cancel)
    }

    /// Create a broker with custom configuration and a fresh registry.
    #[must_use]
    pub fn with_config(config: BrokerConfig, cancel: ShutdownSignal) -> Self {
        Self::with_registry(config, Arc::new(Registry::new()), cancel)
    }

    /// Create a broker routing to an existing registry.
    #[must_use]
    pub fn with_registry(
        config: BrokerConfig,
        registry: Arc<Registry>,
        cancel: ShutdownSignal,
    ) -> Self {
        info!("Creating broker with config: {:?}", config);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        Self {
            config,
            registry,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            cancel,
            done: ShutdownSignal::new(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Get the broker configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Get the subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Create an endpoint/inbox pair sized by `endpoint_capacity`.
    #[must_use]
    pub fn endpoint(&self) -> (Endpoint, Inbox) {
        registry::endpoint(self.config.endpoint_capacity)
    }

    /// Register a subscriber, replacing any endpoint it already had.
    pub fn register_user(&self, id: impl Into<SubscriberId>, endpoint: Endpoint) {
        self.registry.register(id, endpoint);
    }

    /// Remove a subscriber. Does nothing if it is not registered.
    pub fn unregister_user(&self, id: &str) {
        self.registry.unregister(id);
    }

    /// Submit a message for routing.
    ///
    /// Waits while the inbound queue is full. Once this returns `Ok` the
    /// message is queued; delivery itself is best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] if termination has fired, including
    /// while this call was waiting for queue space.
    pub async fn send_message(&self, message: Message) -> Result<(), BrokerError> {
        if self.is_shutting_down() {
            return Err(self.reject());
        }

        tokio::select! {
            biased;
            () = self.closing() => Err(self.reject()),
            permit = self.inbound_tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(message);
                    self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                    metrics::record_accepted();
                    Ok(())
                }
                Err(_) => Err(self.reject()),
            },
        }
    }

    /// Run the routing loop until termination fires.
    ///
    /// Only the first call routes anything; later calls return immediately.
    pub async fn run(&self) {
        let inbound = self.inbound_rx.lock().take();
        let Some(mut inbound) = inbound else {
            warn!("Broker routing loop already started");
            return;
        };

        info!("Broker routing loop started");

        let closing = self.closing();
        tokio::pin!(closing);

        loop {
            tokio::select! {
                biased;
                () = &mut closing => break,
                next = inbound.recv() => match next {
                    Some(message) => self.route(message),
                    None => break,
                },
            }
        }

        // Anything still queued is discarded.
        inbound.close();
        self.closed.store(true, Ordering::Release);
        info!(
            routed = self.counters.routed.load(Ordering::Relaxed),
            "Broker routing loop stopped"
        );
    }

    /// Request shutdown of this broker only.
    ///
    /// Idempotent. The external signal is left untouched.
    pub fn shutdown(&self) {
        if self.done.trigger() {
            debug!("Broker shutdown requested");
        }
    }

    /// Check if termination has fired.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_triggered() || self.done.is_triggered()
    }

    /// Get the lifecycle state.
    #[must_use]
    pub fn state(&self) -> BrokerState {
        if self.closed.load(Ordering::Acquire) {
            BrokerState::Closed
        } else if self.is_shutting_down() {
            BrokerState::Closing
        } else {
            BrokerState::Open
        }
    }

    /// Get broker statistics.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let c = &self.counters;
        BrokerStats {
            subscribers: self.registry.len(),
            accepted: c.accepted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            routed: c.routed.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            unroutable: c.unroutable.load(Ordering::Relaxed),
        }
    }

    async fn closing(&self) {
        tokio::select! {
            () = self.cancel.triggered() => {}
            () = self.done.triggered() => {}
        }
    }

    fn reject(&self) -> BrokerError {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        metrics::record_rejected();
        BrokerError::Closed
    }

    fn route(&self, message: Message) {
        let message = Arc::new(message);
        let report = self.registry.deliver(message.target(), &message);

        let c = &self.counters;
        c.routed.fetch_add(1, Ordering::Relaxed);
        c.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        c.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        if report.unroutable {
            c.unroutable.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_routed(&report, message.broadcast);

        trace!(
            sender = %message.sender,
            broadcast = message.broadcast,
            delivered = report.delivered,
            dropped = report.dropped,
            "Routed message"
        );
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("subscribers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
