//! Node client configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default regtest RPC port
pub const DEFAULT_RPC_PORT: u16 = 18443;

/// Supported chain families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Btc,
    Bsv,
}

impl Backend {
    /// Wallet signing method for this node family.
    pub fn sign_method(self) -> &'static str {
        match self {
            Self::Btc => "signrawtransactionwithwallet",
            Self::Bsv => "signrawtransaction",
        }
    }

    /// Address introspection method exposing `scriptPubKey`.
    pub fn address_info_method(self) -> &'static str {
        match self {
            Self::Btc => "getaddressinfo",
            Self::Bsv => "validateaddress",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Btc => write!(f, "btc"),
            Self::Bsv => write!(f, "bsv"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btc" => Ok(Self::Btc),
            "bsv" => Ok(Self::Bsv),
            other => Err(format!("unknown blockchain '{other}', expected btc or bsv")),
        }
    }
}

/// Connection settings for a node's JSON-RPC endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub backend: Backend,
    /// Flat fee per transaction, in satoshis.
    pub fee_sat: u64,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_RPC_PORT,
            user: "bitcoin".to_string(),
            password: "bitcoin".to_string(),
            backend: Backend::Btc,
            fee_sat: 3_000,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .field("fee_sat", &self.fee_sat)
            .finish_non_exhaustive()
    }
}

impl RpcConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("rpc host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("rpc port must be non-zero".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("rpc request timeout must be positive".to_string());
        }
        Ok(())
    }
}
