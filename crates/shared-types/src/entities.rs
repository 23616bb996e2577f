//! # Core Domain Entities
//!
//! Defines the chain-level values that flow between the harness subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: [`Hash256`]
//! - **Spending**: [`SpendableOutput`], [`SubmittedTx`]
//! - **Measurement**: [`BlockSize`]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::HashParseError;

/// Value in the smallest currency unit.
pub type Satoshis = u64;

/// Satoshis in one whole coin, used when a node reports values as decimals.
pub const SATS_PER_COIN: f64 = 100_000_000.0;

// =============================================================================
// IDENTITY
// =============================================================================

/// A 32-byte transaction or block hash.
///
/// Bytes are held in RPC display order, the order nodes print them in and the
/// order the `hashblock` feed publishes them in. Use [`Hash256::to_wire_bytes`]
/// when serializing into a raw transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Length of a hash in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw bytes given in display order.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Bytes in display order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Bytes in wire order (reversed display order).
    #[must_use]
    pub fn to_wire_bytes(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(decoded.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Hash256 {
    type Error = HashParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hash256> for String {
    fn from(hash: Hash256) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({self})")
    }
}

// =============================================================================
// SPENDING
// =============================================================================

/// An unspent output the harness controls and can spend.
///
/// `vout` must reference an existing output of `txid`; `script_pubkey_hex` is
/// the locking script needed to sign the spend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpendableOutput {
    /// Transaction that created the output.
    pub txid: Hash256,
    /// Index of the output inside `txid`.
    pub vout: u32,
    /// Output value.
    pub value: Satoshis,
    /// Locking script, hex encoded.
    pub script_pubkey_hex: String,
}

impl SpendableOutput {
    /// Whether spending this output can still pay `fee` and leave a
    /// non-zero self-paying output behind.
    #[must_use]
    pub fn can_pay(&self, fee: Satoshis) -> bool {
        self.value > fee
    }

    /// The output created by spending `self` in a self-paying transaction.
    ///
    /// Self-paying transactions have a single output at index 0 locked to the
    /// same key, so the script carries over unchanged.
    #[must_use]
    pub fn recycled(&self, submitted: &SubmittedTx) -> Self {
        Self {
            txid: submitted.txid,
            vout: 0,
            value: submitted.value,
            script_pubkey_hex: self.script_pubkey_hex.clone(),
        }
    }
}

/// Result of a successful self-paying submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    /// Hash of the accepted transaction.
    pub txid: Hash256,
    /// Value of its single output.
    pub value: Satoshis,
}

// =============================================================================
// MEASUREMENT
// =============================================================================

/// Size metadata of a block as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockSize {
    /// Serialized block size.
    pub size_bytes: u64,
    /// Number of transactions including the coinbase.
    pub tx_count: u64,
}
