//! # courier-core
//!
//! In-process message broker for chat traffic.
//!
//! This crate provides:
//!
//! - **Message** - Immutable chat message, direct or broadcast
//! - **Registry** - Subscriber ID to delivery endpoint map behind a reader/writer lock
//! - **Broker** - Bounded inbound queue plus a single routing loop
//! - **ShutdownSignal** - One-shot cancellation source observed by the broker
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Producers  │────▶│   Inbound   │────▶│   Routing   │────▶│  Endpoints  │
//! └─────────────┘     │    queue    │     │    loop     │     └─────────────┘
//!                     └─────────────┘     └─────────────┘
//!                                                │ read lock
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │  Registry   │
//!                                         └─────────────┘
//! ```
//!
//! Delivery is best-effort: unknown recipients and full endpoints drop the
//! message silently. The only error a producer sees is
//! [`BrokerError::Closed`].

pub mod broker;
pub mod config;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod shutdown;

pub use broker::{Broker, BrokerError, BrokerState, BrokerStats};
pub use config::{BrokerConfig, ConfigError};
pub use message::{Message, SubscriberId, Target};
pub use registry::{endpoint, DeliveryReport, Endpoint, Inbox, Registry};
pub use shutdown::ShutdownSignal;
