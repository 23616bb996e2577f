//! Error types for the broadcaster subsystem

use shared_types::ProcessorError;
use thiserror::Error;

/// Result type alias for broadcaster operations
pub type Result<T> = std::result::Result<T, BroadcastError>;

/// Errors surfaced to the broadcaster's caller.
///
/// Per-submission failures never appear here; they are classified, logged
/// and counted inside the run loop.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// UTXO preparation failed
    #[error("UTXO preparation failed: {0}")]
    Prepare(#[source] ProcessorError),

    /// `start` was called twice
    #[error("Broadcaster already started")]
    AlreadyStarted,
}
