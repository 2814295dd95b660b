//! Chat message types routed by the broker.
//!
//! A [`Message`] is fully populated by its producer before submission and is
//! never touched by the broker afterwards. Fan-out shares a single
//! `Arc<Message>` between all recipients.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a subscriber (sender or recipient).
pub type SubscriberId = String;

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Originating subscriber.
    pub sender: SubscriberId,
    /// Target subscriber. Ignored when `broadcast` is set.
    #[serde(default)]
    pub recipient: SubscriberId,
    /// Payload text.
    pub content: String,
    /// Fan out to every registered subscriber instead of `recipient`.
    #[serde(default)]
    pub broadcast: bool,
    /// Creation time set by the producer.
    pub timestamp: i64,
}

/// Where a message should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Every currently registered subscriber, the sender included.
    All,
    /// A single subscriber.
    One(&'a str),
}

impl Message {
    /// Create a point-to-point message stamped with the current time.
    #[must_use]
    pub fn direct(
        sender: impl Into<SubscriberId>,
        recipient: impl Into<SubscriberId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            broadcast: false,
            timestamp: now_millis(),
        }
    }

    /// Create a broadcast message stamped with the current time.
    #[must_use]
    pub fn broadcast(sender: impl Into<SubscriberId>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: SubscriberId::new(),
            content: content.into(),
            broadcast: true,
            timestamp: now_millis(),
        }
    }

    /// Override the producer timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Resolve the delivery target of this message.
    #[must_use]
    pub fn target(&self) -> Target<'_> {
        if self.broadcast {
            Target::All
        } else {
            Target::One(&self.recipient)
        }
    }
}
