//! Node JSON-RPC access
//!
//! [`ChainRpc`] is the narrow set of node calls the processor needs;
//! [`RpcClient`] implements it over HTTP.

mod client;
pub mod types;

pub use client::RpcClient;

use async_trait::async_trait;

use crate::error::Result;
use types::{BlockInfo, MiningInfo, NetworkInfo, SignedTx, TxOutInfo};

/// Node calls used by [`crate::RpcProcessor`].
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn generate_to_address(&self, blocks: u64, address: &str) -> Result<Vec<String>>;

    async fn get_mining_info(&self) -> Result<MiningInfo>;

    async fn get_network_info(&self) -> Result<NetworkInfo>;

    async fn get_block_hash(&self, height: u64) -> Result<String>;

    async fn get_block(&self, hash: &str) -> Result<BlockInfo>;

    /// `None` when the output is spent or unknown.
    async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Option<TxOutInfo>>;

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String>;

    async fn get_raw_mempool(&self) -> Result<Vec<String>>;

    async fn get_new_address(&self) -> Result<String>;

    /// Locking script of a wallet address, hex encoded.
    async fn address_script(&self, address: &str) -> Result<String>;

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<SignedTx>;
}
