//! HTTP JSON-RPC client for bitcoind-style nodes

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::trace;

use super::types::*;
use super::ChainRpc;
use crate::config::{Backend, RpcConfig};
use crate::error::{Result, RpcError};

/// Node RPC client.
pub struct RpcClient {
    client: Client,
    url: String,
    user: String,
    password: String,
    backend: Backend,
    request_id: AtomicU64,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Build a client for the configured node. Does not touch the network.
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(RpcError::Http)?;

        Ok(Self {
            client,
            url: config.url(),
            user: config.user.clone(),
            password: config.password.clone(),
            backend: config.backend,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a method whose result may legitimately be `null`.
    async fn call_optional<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>> {
        let request = JsonRpcRequest::new(method, params, self.next_id());
        trace!(method, id = request.id, "rpc call");

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RpcError::Connection(format!("Cannot connect to {}", self.url))
                } else {
                    RpcError::Http(e)
                }
            })?;

        // bitcoind reports RPC errors with HTTP 500 and a JSON body, so the
        // body is parsed before the status is considered.
        let status = response.status();
        let body = response.bytes().await?;
        let rpc_response: JsonRpcResponse<R> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Status {
                    method: method.to_string(),
                    status: status.as_u16(),
                })
            }
            Err(e) => return Err(RpcError::Parse(format!("{method}: {e}"))),
        };

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(rpc_response.result)
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| RpcError::MissingResult(method.to_string()))
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn generate_to_address(&self, blocks: u64, address: &str) -> Result<Vec<String>> {
        self.call("generatetoaddress", json!([blocks, address])).await
    }

    async fn get_mining_info(&self) -> Result<MiningInfo> {
        self.call("getmininginfo", json!([])).await
    }

    async fn get_network_info(&self) -> Result<NetworkInfo> {
        self.call("getnetworkinfo", json!([])).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<String> {
        self.call("getblockhash", json!([height])).await
    }

    async fn get_block(&self, hash: &str) -> Result<BlockInfo> {
        self.call("getblock", json!([hash, 1])).await
    }

    async fn get_tx_out(&self, txid: &str, vout: u32) -> Result<Option<TxOutInfo>> {
        self.call_optional("gettxout", json!([txid, vout, false]))
            .await
    }

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String> {
        self.call("sendrawtransaction", json!([tx_hex])).await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<String>> {
        self.call("getrawmempool", json!([])).await
    }

    async fn get_new_address(&self) -> Result<String> {
        match self.backend {
            // legacy keeps the unsigned template free of witness data
            Backend::Btc => self.call("getnewaddress", json!(["", "legacy"])).await,
            Backend::Bsv => self.call("getnewaddress", json!([])).await,
        }
    }

    async fn address_script(&self, address: &str) -> Result<String> {
        let info: AddressInfo = self
            .call(self.backend.address_info_method(), json!([address]))
            .await?;
        Ok(info.script_pub_key)
    }

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<SignedTx> {
        self.call(self.backend.sign_method(), json!([tx_hex])).await
    }
}
