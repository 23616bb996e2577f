//! Unsigned legacy transaction templates
//!
//! The node wallet fills in the signature scripts; this module only lays out
//! inputs and outputs in the pre-segwit serialization both node families
//! accept for signing.

use shared_types::{Hash256, SpendableOutput};

const TX_VERSION: u32 = 1;
const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const LOCK_TIME: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TxIn {
    prev_txid: Hash256,
    vout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// Transaction with empty signature scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsignedTx {
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
}

impl UnsignedTx {
    /// Template spending a single output.
    pub fn spending(output: &SpendableOutput) -> Self {
        Self {
            inputs: vec![TxIn {
                prev_txid: output.txid,
                vout: output.vout,
            }],
            outputs: Vec::new(),
        }
    }

    /// Append an output.
    pub fn pay(mut self, value: u64, script_pubkey: &[u8]) -> Self {
        self.outputs.push(TxOut {
            value,
            script_pubkey: script_pubkey.to_vec(),
        });
        self
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.inputs.len() * 41 + self.outputs.len() * 34);
        buf.extend_from_slice(&TX_VERSION.to_le_bytes());

        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_txid.to_wire_bytes());
            buf.extend_from_slice(&input.vout.to_le_bytes());
            write_compact_size(&mut buf, 0);
            buf.extend_from_slice(&SEQUENCE_FINAL.to_le_bytes());
        }

        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut buf, output.script_pubkey.len() as u64);
            buf.extend_from_slice(&output.script_pubkey);
        }

        buf.extend_from_slice(&LOCK_TIME.to_le_bytes());
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}
