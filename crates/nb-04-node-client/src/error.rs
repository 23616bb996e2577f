//! Error types for the node client

use shared_types::ProcessorError;
use thiserror::Error;

/// Result type alias for RPC calls
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors raised while talking to a node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Node returned HTTP {status} for {method}")]
    Status { method: String, status: u16 },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Missing result for {0}")]
    MissingResult(String),
}

impl From<RpcError> for ProcessorError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Rpc { code, message } => ProcessorError::Rpc { code, message },
            RpcError::Connection(reason) => ProcessorError::Connection(reason),
            RpcError::Http(e) => ProcessorError::Connection(e.to_string()),
            RpcError::Status { .. } => ProcessorError::Connection(err.to_string()),
            RpcError::Parse(reason) => ProcessorError::Decode(reason),
            RpcError::MissingResult(_) => ProcessorError::Decode(err.to_string()),
        }
    }
}
