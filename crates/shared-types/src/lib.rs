//! # Shared Types Crate
//!
//! This crate contains the domain values and the node processor port that
//! every harness subsystem depends on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Backend Neutrality**: Subsystems talk to a chain backend only through
//!   [`NodeProcessor`]; they never learn which chain family sits behind it.
//! - **Classified Failures**: [`ProcessorError`] knows which submission
//!   failures are terminal so callers can drop work instead of retrying it.

pub mod entities;
pub mod errors;
pub mod processor;

pub use entities::*;
pub use errors::*;
pub use processor::{NodeProcessor, OutputSink};
