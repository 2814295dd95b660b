//! Subscriber registry.
//!
//! Maps subscriber IDs to their delivery endpoints. Registration and
//! removal take the write lock; a routing pass holds the read lock for the
//! whole fan-out so it always sees a consistent set of subscribers.

use crate::message::{Message, SubscriberId, Target};
use crate::metrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Sending half of a subscriber's bounded inbox. Owned by whoever registered it.
pub type Endpoint = mpsc::Sender<Arc<Message>>;

/// Receiving half of a subscriber's bounded inbox.
pub type Inbox = mpsc::Receiver<Arc<Message>>;

/// Create an endpoint/inbox pair holding at most `capacity` messages.
///
/// A capacity of zero is bumped to one.
#[must_use]
pub fn endpoint(capacity: usize) -> (Endpoint, Inbox) {
    mpsc::channel(capacity.max(1))
}

/// Outcome of a single routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Endpoints that accepted the message.
    pub delivered: usize,
    /// Endpoints that were full or whose inbox was dropped.
    pub dropped: usize,
    /// The direct recipient was not registered.
    pub unroutable: bool,
}

/// Registry of live subscribers.
#[derive(Debug, Default)]
pub struct Registry {
    endpoints: RwLock<HashMap<SubscriberId, Endpoint>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, replacing any endpoint it already had.
    ///
    /// Returns `true` if an existing endpoint was replaced.
    pub fn register(&self, id: impl Into<SubscriberId>, endpoint: Endpoint) -> bool {
        let id = id.into();
        let mut endpoints = self.endpoints.write();
        let replaced = endpoints.insert(id.clone(), endpoint).is_some();
        // Set under the guard so the gauge follows lock order
        metrics::set_subscribers(endpoints.len());
        drop(endpoints);

        debug!(subscriber = %id, replaced, "Subscriber registered");
        replaced
    }

    /// Remove `id`. Returns `true` if it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut endpoints = self.endpoints.write();
        let removed = endpoints.remove(id).is_some();
        if removed {
            metrics::set_subscribers(endpoints.len());
        }
        drop(endpoints);

        if removed {
            debug!(subscriber = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Check if `id` has an endpoint.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.endpoints.read().contains_key(id)
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Check if no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// All registered subscriber IDs, in no particular order.
    #[must_use]
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.endpoints.read().keys().cloned().collect()
    }

    /// Push `message` to the endpoints selected by `target` without blocking.
    ///
    /// Full or closed endpoints are skipped; the remaining ones still get
    /// their copy. Holds the read lock for the whole pass.
    pub fn deliver(&self, target: Target<'_>, message: &Arc<Message>) -> DeliveryReport {
        let endpoints = self.endpoints.read();
        let mut report = DeliveryReport::default();

        match target {
            Target::All => {
                for (id, endpoint) in endpoints.iter() {
                    push(id, endpoint, message, &mut report);
                }
            }
            Target::One(id) => match endpoints.get(id) {
                Some(endpoint) => push(id, endpoint, message, &mut report),
                None => {
                    trace!(recipient = %id, "Unknown recipient, message dropped");
                    report.unroutable = true;
                }
            },
        }

        report
    }
}

fn push(id: &str, endpoint: &Endpoint, message: &Arc<Message>, report: &mut DeliveryReport) {
    match endpoint.try_send(Arc::clone(message)) {
        Ok(()) => report.delivered += 1,
        Err(TrySendError::Full(_)) => {
            trace!(subscriber = %id, "Endpoint full, message dropped");
            report.dropped += 1;
        }
        Err(TrySendError::Closed(_)) => {
            trace!(subscriber = %id, "Endpoint closed, message dropped");
            report.dropped += 1;
        }
    }
}
