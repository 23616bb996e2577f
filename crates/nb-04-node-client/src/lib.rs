//! # Node Client Subsystem
//!
//! **Subsystem ID:** 4
//!
//! Chain backends behind [`shared_types::NodeProcessor`]. Both supported
//! families expose the bitcoind JSON-RPC dialect; they differ only in the
//! wallet method names.
//!
//! ```text
//! ┌──────────────┐   NodeProcessor   ┌──────────────┐  JSON-RPC 1.0  ┌──────┐
//! │ nb-01/02/03  │ ────────────────▶ │ RpcProcessor │ ─────────────▶ │ node │
//! └──────────────┘                   │  + UnsignedTx│   basic auth   └──────┘
//!                                    └──────────────┘
//! ```
//!
//! | Backend | Signing                        | Address script    |
//! |---------|--------------------------------|-------------------|
//! | `btc`   | `signrawtransactionwithwallet` | `getaddressinfo`  |
//! | `bsv`   | `signrawtransaction`           | `validateaddress` |
//!
//! Transactions are laid out unsigned by [`tx::UnsignedTx`] and signed by
//! the node wallet; the harness never holds keys.

#![warn(clippy::all)]

mod config;
mod error;
pub mod processor;
pub mod rpc;
pub mod tx;

pub use config::{Backend, RpcConfig, DEFAULT_RPC_PORT};
pub use error::{Result, RpcError};
pub use processor::RpcProcessor;
pub use rpc::{ChainRpc, RpcClient};

/// Subsystem identifier used in log fields.
pub const SUBSYSTEM_ID: u8 = 4;

/// Connect to the configured node.
///
/// # Errors
///
/// Fails when the client cannot be built or the node does not answer the
/// startup introspection calls.
pub async fn connect(
    config: &RpcConfig,
) -> std::result::Result<RpcProcessor<RpcClient>, shared_types::ProcessorError> {
    let client = RpcClient::new(config)?;
    RpcProcessor::connect(client, config.backend, config.fee_sat).await
}
