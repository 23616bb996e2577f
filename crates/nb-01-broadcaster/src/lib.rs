//! # Transaction Broadcaster Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Sustains a target submission rate against a node by spending outputs
//! from a bounded pool into self-paying transactions and pushing each new
//! output back into the pool.
//!
//! ## Recycling
//!
//! ```text
//!        pop ┌───────────┐ submit ┌──────────────┐
//!   ┌───────▶│ tick loop │───────▶│ NodeProcessor│
//!   │        └─────┬─────┘        └──────┬───────┘
//!   │              │ change output       │
//! ┌─┴──────────┐   │◀────────────────────┘
//! │  UtxoPool  │◀──┘ push
//! └────────────┘
//! ```
//!
//! Each success pops one entry and pushes one entry, so the pool depth is
//! steady. Outputs whose submission fails terminally, or exhausts its
//! attempts, are dropped and never replaced: a long run shrinks the pool.
//!
//! ## Failure Policy
//!
//! | Failure | Action |
//! |---------|--------|
//! | Terminal rejection (`is_terminal`) | Drop output, no retry |
//! | Other error | Pause `retry_pause`, retry up to `max_attempts` |
//! | Attempts exhausted | Drop output |
//! | Cancellation | Stop immediately |

#![warn(clippy::all)]

pub mod pool;
pub mod service;

mod config;
mod error;
mod metrics;

pub use config::{BroadcasterConfig, RunBudget};
pub use error::{BroadcastError, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pool::UtxoPool;
pub use service::{Broadcaster, RunSummary, StopReason};

/// Subsystem identifier used in log fields.
pub const SUBSYSTEM_ID: u8 = 1;

/// Default pool capacity.
pub const DEFAULT_POOL_CAPACITY: usize = 10_100;

/// Default network fee per self-paying transaction, in satoshis.
pub const DEFAULT_FEE_SAT: u64 = 3_000;
