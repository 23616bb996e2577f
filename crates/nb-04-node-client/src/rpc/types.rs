//! Wire types for the node JSON-RPC interface

use serde::{Deserialize, Serialize};

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: T,
    pub id: u64,
}

impl<T> JsonRpcRequest<T> {
    pub fn new(method: impl Into<String>, params: T, id: u64) -> Self {
        Self {
            // bitcoind and bitcoin-sv both speak the 1.0 dialect
            jsonrpc: "1.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC response envelope
///
/// `result` is `None` both on error and when the node legitimately answers
/// `null` (for example `gettxout` on a spent output).
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: serde_json::Value,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

/// Subset of `getmininginfo`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MiningInfo {
    pub blocks: u64,
    #[serde(default, alias = "currentblocksize")]
    pub current_block_size: Option<u64>,
    #[serde(default, alias = "currentblocktx")]
    pub current_block_tx: Option<u64>,
}

/// Subset of `getnetworkinfo`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInfo {
    pub version: u64,
    #[serde(default, alias = "subversion")]
    pub sub_version: String,
}

/// `getblock <hash> 1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockInfo {
    pub hash: String,
    pub size: u64,
    #[serde(default)]
    pub height: u64,
    /// Transaction ids, coinbase first.
    #[serde(default)]
    pub tx: Vec<String>,
}

/// `gettxout` result for an unspent output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxOutInfo {
    /// Amount in coins.
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
    #[serde(default)]
    pub confirmations: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    pub hex: String,
}

/// `getaddressinfo` (BTC) or `validateaddress` (BSV)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
}

/// `signrawtransactionwithwallet` / `signrawtransaction`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignedTx {
    pub hex: String,
    pub complete: bool,
    #[serde(default)]
    pub errors: Vec<SigningFailure>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningFailure {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
    #[serde(default)]
    pub error: String,
}

impl SignedTx {
    /// First wallet complaint, or a generic message.
    pub fn failure_reason(&self) -> String {
        self.errors
            .first()
            .map(|e| format!("{}:{} {}", e.txid, e.vout, e.error))
            .unwrap_or_else(|| "wallet returned an incomplete signature".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_parses() {
        let body = r#"{"result":null,"error":{"code":-26,"message":"txn-mempool-conflict"},"id":3}"#;
        let response: JsonRpcResponse<String> = serde_json::from_str(body).unwrap();
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -26);
        assert_eq!(error.to_string(), "RPC Error -26: txn-mempool-conflict");
    }

    #[test]
    fn test_null_txout_is_none() {
        let body = r#"{"result":null,"error":null,"id":1}"#;
        let response: JsonRpcResponse<TxOutInfo> = serde_json::from_str(body).unwrap();
        assert!(response.result.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_txout_parses() {
        let body = r#"{"result":{"bestblock":"00","confirmations":101,"value":50.00000000,
            "scriptPubKey":{"asm":"","hex":"76a91400ac","type":"pubkeyhash"},"coinbase":true},
            "error":null,"id":"x"}"#;
        let response: JsonRpcResponse<TxOutInfo> = serde_json::from_str(body).unwrap();
        let out = response.result.unwrap();
        assert_eq!(out.value, 50.0);
        assert_eq!(out.script_pub_key.hex, "76a91400ac");
        assert_eq!(out.confirmations, 101);
    }

    #[test]
    fn test_block_parses() {
        let body = r#"{"hash":"ab","confirmations":1,"size":1234,"height":7,"tx":["c1","t2"]}"#;
        let block: BlockInfo = serde_json::from_str(body).unwrap();
        assert_eq!(block.size, 1234);
        assert_eq!(block.tx, vec!["c1", "t2"]);
    }

    #[test]
    fn test_incomplete_signature_reason() {
        let signed: SignedTx = serde_json::from_str(
            r#"{"hex":"00","complete":false,"errors":[{"txid":"aa","vout":1,"error":"Input not found or already spent"}]}"#,
        )
        .unwrap();
        assert!(!signed.complete);
        assert_eq!(signed.failure_reason(), "aa:1 Input not found or already spent");
    }

    fn decode<R: serde::de::DeserializeOwned>(body: &str) -> JsonRpcResponse<R> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_missing_result_field_decodes_for_any_reply_type() {
        let response: JsonRpcResponse<MiningInfo> =
            decode(r#"{"error":{"code":-8,"message":"Block height out of range"},"id":2}"#);
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -8);
    }
}
