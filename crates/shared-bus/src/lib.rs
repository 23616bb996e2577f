//! # Shared Bus - Reconnecting Pub/Sub Client
//!
//! Connects to a node's publish endpoint and fans each received frame out to
//! every channel subscribed to its topic.
//!
//! ## Single-Writer Registry
//!
//! ```text
//! ┌──────────────┐  subscribe()    ┌──────────────┐
//! │  BusHandle   │ ──────────────▶ │ request queue│
//! │ (any task)   │  unsubscribe()  │  (bounded)   │
//! └──────────────┘                 └──────┬───────┘
//!                                         │ drained between receives
//!                                         ▼
//!   socket ──recv──▶ ┌──────────────────────────┐ ──▶ subscriber A
//!                    │ dispatch loop (EventBus) │ ──▶ subscriber B
//!                    │ owns topic → [channels]  │
//!                    └──────────────────────────┘
//! ```
//!
//! Only the dispatch loop touches the registry, so no lock guards it.
//!
//! ## Backpressure
//!
//! Delivery awaits each subscriber channel in turn. A full subscriber
//! channel stalls the dispatch loop, and with it every other subscriber of
//! every topic, until that subscriber drains.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod config;
pub mod events;
pub mod subscriber;
pub mod transport;

pub use bus::{ConnectionState, EventBus};
pub use config::BusConfig;
pub use events::{topics, BusMessage, Sequence};
pub use subscriber::{BusHandle, SubscriptionRequest};
pub use transport::{Connector, FrameSocket, MemoryConnector, MemoryFeed, ZmqConnector};

use thiserror::Error;

/// Errors from the transport layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connecting to the endpoint failed.
    #[error("Connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Registering a topic filter failed.
    #[error("Subscribe to topic {topic:?} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Receiving a frame failed.
    #[error("Receive failed: {0}")]
    Receive(String),

    /// The remote side went away.
    #[error("Socket closed")]
    Closed,
}

/// Errors from event bus operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Initial connection could not be established.
    #[error("Could not connect to {endpoint} after {attempts} attempts: {last}")]
    ConnectExhausted {
        endpoint: String,
        attempts: u32,
        last: TransportError,
    },

    /// A frame did not carry the mandatory topic and payload fields.
    #[error("Malformed frame: expected at least 2 fields, got {0}")]
    Malformed(usize),

    /// The dispatch loop is no longer running.
    #[error("Event bus closed")]
    Closed,

    /// Configuration rejected.
    #[error("Invalid bus configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
