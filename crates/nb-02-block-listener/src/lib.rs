//! # Block Listener Subsystem
//!
//! **Subsystem ID:** 2
//!
//! Consumes `hashblock` messages from the event bus, measures each accepted
//! block and signals the miner simulator that a competitor won the race.
//!
//! ```text
//! EventBus ──BusMessage──▶ BlockListener ──Hash256──▶ MinerSimulator
//!                               │
//!                               ├─ get_block_size ─▶ NodeProcessor
//!                               └─ target "measurements" log record
//! ```
//!
//! Parse and query failures are logged and the event dropped; the listener
//! only stops on cancellation or when the inbound channel closes.

mod config;
mod error;
pub mod service;

pub use config::ListenerConfig;
pub use error::{ListenerError, Result};
pub use service::{BlockListener, BlockRecord, ListenerStats};

/// Subsystem identifier used in log fields.
pub const SUBSYSTEM_ID: u8 = 2;

/// Tracing target of per-block measurement records.
pub const MEASUREMENT_TARGET: &str = "measurements";
