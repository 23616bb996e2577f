//! # Miner Simulator Subsystem
//!
//! **Subsystem ID:** 3
//!
//! Simulates one block producer racing the rest of the network. Block
//! discovery is a Poisson process: inter-arrival times are drawn from an
//! exponential distribution with mean τ.
//!
//! ## Race
//!
//! ```text
//!            draw ~ Exp(τ)
//!   armed ───────────────────▶ fires ──▶ generate_block ──▶ armed (fresh draw)
//!     ▲                                                        │
//!     └──── competitor block observed: fresh draw from now ◀───┘
//! ```
//!
//! The exponential distribution is memoryless, so restarting the timer when
//! a competitor wins is equivalent to the race having no memory of the time
//! already spent.
//!
//! A zero or absent τ disables the simulator entirely.

mod config;
mod error;
pub mod sampler;
pub mod service;

pub use config::MinerConfig;
pub use error::{MinerError, Result};
pub use sampler::{ExponentialSampler, IntervalSampler};
pub use service::{MinerSimulator, MinerStats};

/// Subsystem identifier used in log fields.
pub const SUBSYSTEM_ID: u8 = 3;
