//! Error types for the block listener

use shared_types::{HashParseError, ProcessorError};
use thiserror::Error;

/// Result type alias for listener operations
pub type Result<T> = std::result::Result<T, ListenerError>;

/// Reasons an announced block could not be measured
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Payload is not a block hash
    #[error("Invalid block hash {payload:?}: {source}")]
    InvalidHash {
        payload: String,
        #[source]
        source: HashParseError,
    },

    /// Block metadata query failed
    #[error("Block query for {hash} failed: {source}")]
    BlockQuery {
        hash: String,
        #[source]
        source: ProcessorError,
    },
}
