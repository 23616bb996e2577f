//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Rejection reasons that can never succeed on retry.
///
/// The spent output (or its mempool chain) is already final from the node's
/// point of view; the work item must be dropped.
pub const TERMINAL_REJECTIONS: &[&str] = &[
    "Transaction outputs already in utxo set",
    "txn-already-known",
    "txn-mempool-conflict",
    "already spent",
    "bad-txns-inputs-missingorspent",
    "missing-inputs",
    "too-long-mempool-chain",
];

/// Errors reported by a [`crate::NodeProcessor`] backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessorError {
    /// The node answered with a JSON-RPC error.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The node wallet could not fully sign a transaction.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The node answered with something we could not interpret.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The output cannot cover the network fee.
    #[error("Output value {value} does not cover fee {fee}")]
    InsufficientValue { value: u64, fee: u64 },

    /// No unspent coinbase output could be located.
    #[error("No spendable coinbase output found after {attempts} blocks")]
    NoSpendableCoinbase { attempts: u32 },

    /// The output pool stopped accepting entries.
    #[error("Output pool closed")]
    PoolClosed,

    /// The backend does not offer this capability.
    #[error("Operation not supported by backend: {0}")]
    Unsupported(&'static str),

    /// The operation was interrupted by cancellation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ProcessorError {
    /// Check if the failure is terminal for the submitted output.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::InsufficientValue { .. } => true,
            Self::Rpc { message, .. } => TERMINAL_REJECTIONS
                .iter()
                .any(|needle| message.contains(needle)),
            _ => false,
        }
    }

    /// Check if the failure is a cancellation rather than a real error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the backend simply lacks the capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Errors from parsing a hex encoded hash.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HashParseError {
    /// Input is not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes.
    #[error("Expected 32 bytes, got {0}")]
    InvalidLength(usize),
}
