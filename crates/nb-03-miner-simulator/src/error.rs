//! Error types for the miner simulator

use thiserror::Error;

/// Result type alias for miner operations
pub type Result<T> = std::result::Result<T, MinerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MinerError {
    /// No mean interval configured; the simulator must not run
    #[error("Miner simulator disabled: mean interval is zero or unset")]
    Disabled,
}
