//! `NodeProcessor` over a node's JSON-RPC wallet

use std::time::Duration;

use async_trait::async_trait;
use shared_types::processor::Result;
use shared_types::{
    BlockSize, Hash256, NodeProcessor, OutputSink, ProcessorError, SpendableOutput, SubmittedTx,
    SATS_PER_COIN,
};
use tracing::{debug, info, warn};

use crate::config::Backend;
use crate::rpc::ChainRpc;
use crate::tx::UnsignedTx;

/// Confirmations before a coinbase output may be spent.
pub const COINBASE_MATURITY: u64 = 100;
/// Equal-value outputs per split transaction, change excluded.
pub const OUTPUTS_PER_SPLIT: usize = 20;
/// Blocks mined while hunting for an unspent coinbase.
pub const MAX_COINBASE_ATTEMPTS: u32 = 11;
/// Consecutive root splits the node may reject before preparation gives up.
const MAX_ROOT_REJECTIONS: u32 = 10;
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);
const ROOT_SCRIPT_FAILURE: &str = "mandatory-script-verify-flag-failed";

/// Chain backend driving a node through its wallet RPC.
pub struct RpcProcessor<C> {
    rpc: C,
    backend: Backend,
    fee_sat: u64,
    address: String,
    script_pubkey: Vec<u8>,
}

impl<C> std::fmt::Debug for RpcProcessor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcProcessor")
            .field("backend", &self.backend)
            .field("address", &self.address)
            .field("fee_sat", &self.fee_sat)
            .finish_non_exhaustive()
    }
}

impl<C: ChainRpc> RpcProcessor<C> {
    /// Create a wallet address for the run and log the node's state.
    pub async fn connect(rpc: C, backend: Backend, fee_sat: u64) -> Result<Self> {
        let mining = rpc.get_mining_info().await?;
        let network = rpc.get_network_info().await?;
        info!(
            %backend,
            blocks = mining.blocks,
            current_block_size = mining.current_block_size.unwrap_or_default(),
            version = network.version,
            subversion = %network.sub_version,
            "[nb-04] Connected to node"
        );

        let address = rpc.get_new_address().await?;
        let script_hex = rpc.address_script(&address).await?;
        let script_pubkey = hex::decode(&script_hex)
            .map_err(|e| ProcessorError::Decode(format!("scriptPubKey {script_hex}: {e}")))?;
        info!(%address, "New address");

        Ok(Self {
            rpc,
            backend,
            fee_sat,
            address,
            script_pubkey,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    async fn block_height(&self) -> Result<u64> {
        Ok(self.rpc.get_mining_info().await?.blocks)
    }

    /// Mine one block, then look for the unspent vout-0 coinbase that just
    /// matured. Repeats while the candidate turns out spent.
    async fn mature_coinbase(&self) -> Result<SpendableOutput> {
        for _ in 0..MAX_COINBASE_ATTEMPTS {
            self.rpc.generate_to_address(1, &self.address).await?;

            let height = self.block_height().await?;
            let Some(mature_height) = height.checked_sub(COINBASE_MATURITY) else {
                continue;
            };
            let hash = self.rpc.get_block_hash(mature_height).await?;
            let block = self.rpc.get_block(&hash).await?;
            let coinbase = block
                .tx
                .first()
                .ok_or_else(|| ProcessorError::Decode(format!("block {hash} has no transactions")))?;

            match self.rpc.get_tx_out(coinbase, 0).await? {
                Some(out) => {
                    return Ok(SpendableOutput {
                        txid: parse_txid(coinbase)?,
                        vout: 0,
                        value: to_satoshis(out.value),
                        script_pubkey_hex: out.script_pub_key.hex,
                    })
                }
                None => debug!(txid = %coinbase, "Coinbase already spent, mining another block"),
            }
        }
        Err(ProcessorError::NoSpendableCoinbase {
            attempts: MAX_COINBASE_ATTEMPTS,
        })
    }

    /// Split `input` into `count` equal outputs plus change, all paying the
    /// harness address. Returns the new outputs in vout order.
    async fn split(&self, input: &SpendableOutput, count: usize) -> Result<Vec<SpendableOutput>> {
        let per_output = input.value / (count as u64 + 1);
        let remaining = input.value - per_output * count as u64;
        if per_output == 0 || remaining <= self.fee_sat {
            return Err(ProcessorError::InsufficientValue {
                value: input.value,
                fee: self.fee_sat,
            });
        }

        let tx = (0..count)
            .fold(UnsignedTx::spending(input), |tx, _| {
                tx.pay(per_output, &self.script_pubkey)
            })
            .pay(remaining - self.fee_sat, &self.script_pubkey);

        let txid = self.sign_and_send(&tx).await?;
        let script_pubkey_hex = hex::encode(&self.script_pubkey);
        Ok(tx
            .outputs()
            .iter()
            .zip(0u32..)
            .map(|(out, vout)| SpendableOutput {
                txid,
                vout,
                value: out.value,
                script_pubkey_hex: script_pubkey_hex.clone(),
            })
            .collect())
    }

    async fn sign_and_send(&self, tx: &UnsignedTx) -> Result<Hash256> {
        let signed = self.rpc.sign_raw_transaction(&tx.to_hex()).await?;
        if !signed.complete {
            return Err(ProcessorError::Signing(signed.failure_reason()));
        }
        let txid = self.rpc.send_raw_transaction(&signed.hex).await?;
        parse_txid(&txid)
    }

    async fn fill(&self, sink: &dyn OutputSink, target: usize) -> Result<()> {
        let height = self.block_height().await?;
        if height <= COINBASE_MATURITY {
            let missing = COINBASE_MATURITY + 1 - height;
            info!(blocks = missing, "Generating blocks to mature coinbase outputs");
            self.rpc.generate_to_address(missing, &self.address).await?;
        }

        let mut rejected_roots = 0;
        'roots: while sink.len() < target {
            let coinbase = self.mature_coinbase().await?;
            let branches = match self.split(&coinbase, OUTPUTS_PER_SPLIT).await {
                Ok(branches) => branches,
                Err(ProcessorError::Rpc { message, .. })
                    if message.contains(ROOT_SCRIPT_FAILURE)
                        && rejected_roots < MAX_ROOT_REJECTIONS =>
                {
                    rejected_roots += 1;
                    warn!(txid = %coinbase.txid, %message, "Root split rejected, trying next coinbase");
                    continue;
                }
                Err(e) => return Err(e),
            };
            rejected_roots = 0;

            for branch in &branches {
                let leaves = match self.split(branch, OUTPUTS_PER_SPLIT).await {
                    Ok(leaves) => leaves,
                    Err(e) => {
                        warn!(txid = %branch.txid, vout = branch.vout, error = %e, "Failed to split output");
                        continue;
                    }
                };
                for leaf in leaves {
                    sink.push(leaf).await?;
                    if sink.len() >= target {
                        break 'roots;
                    }
                }
            }
        }

        self.rpc.generate_to_address(1, &self.address).await?;
        Ok(())
    }
}

#[async_trait]
impl<C: ChainRpc> NodeProcessor for RpcProcessor<C> {
    async fn prepare_utxos(&self, sink: &dyn OutputSink, target: usize) -> Result<()> {
        let work = self.fill(sink, target);
        tokio::pin!(work);
        let mut progress = tokio::time::interval(PROGRESS_INTERVAL);

        let result = loop {
            tokio::select! {
                result = &mut work => break result,
                _ = progress.tick() => info!(count = sink.len(), target, "Creating utxos"),
            }
        };
        info!(count = sink.len(), target, "UTXO preparation finished");
        result
    }

    async fn submit_self_paying_single_output_tx(
        &self,
        output: &SpendableOutput,
    ) -> Result<SubmittedTx> {
        if !output.can_pay(self.fee_sat) {
            return Err(ProcessorError::InsufficientValue {
                value: output.value,
                fee: self.fee_sat,
            });
        }
        let script = hex::decode(&output.script_pubkey_hex).map_err(|e| {
            ProcessorError::Decode(format!("scriptPubKey {}: {e}", output.script_pubkey_hex))
        })?;
        let value = output.value - self.fee_sat;
        let tx = UnsignedTx::spending(output).pay(value, &script);

        let txid = self.sign_and_send(&tx).await?;
        debug!(prev = %output.txid, vout = output.vout, %txid, value, "Submitted self-paying tx");
        Ok(SubmittedTx { txid, value })
    }

    async fn generate_block(&self) -> Result<String> {
        self.rpc
            .generate_to_address(1, &self.address)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProcessorError::Decode("generatetoaddress returned no block".into()))
    }

    async fn get_block_size(&self, block_hash: &Hash256) -> Result<BlockSize> {
        let block = self.rpc.get_block(&block_hash.to_string()).await?;
        Ok(BlockSize {
            size_bytes: block.size,
            tx_count: block.tx.len() as u64,
        })
    }

    async fn get_mempool_size(&self) -> Result<u64> {
        Ok(self.rpc.get_raw_mempool().await?.len() as u64)
    }
}

fn parse_txid(txid: &str) -> Result<Hash256> {
    txid.parse()
        .map_err(|e| ProcessorError::Decode(format!("txid {txid}: {e}")))
}

fn to_satoshis(coins: f64) -> u64 {
    (coins * SATS_PER_COIN).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result as RpcResult, RpcError};
    use crate::rpc::types::{BlockInfo, MiningInfo, NetworkInfo, ScriptPubKey, SignedTx, TxOutInfo};
    use std::sync::Mutex;

    const SCRIPT_HEX: &str = "76a914000102030405060708090a0b0c0d0e0f1011121388ac";
    const COINBASE_SAT: u64 = 5_000_000_000;

    #[derive(Default)]
    struct ChainState {
        height: u64,
        spent_coinbases: u32,
        sent: Vec<String>,
        reject_sends: Option<(i64, String)>,
        incomplete_signing: bool,
        mempool: usize,
    }

    /// In-process stand-in for a regtest node.
    #[derive(Default)]
    struct FakeChain {
        state: Mutex<ChainState>,
    }

    impl FakeChain {
        fn at_height(height: u64) -> Self {
            let chain = Self::default();
            chain.state.lock().unwrap().height = height;
            chain
        }

        fn sent(&self) -> Vec<String> {
            self.state.lock().unwrap().sent.clone()
        }
    }

    fn fake_hash(n: u64) -> String {
        format!("{n:064x}")
    }

    #[async_trait]
    impl ChainRpc for FakeChain {
        async fn generate_to_address(&self, blocks: u64, _address: &str) -> RpcResult<Vec<String>> {
            let mut state = self.state.lock().unwrap();
            let start = state.height;
            state.height += blocks;
            Ok((start + 1..=state.height).map(fake_hash).collect())
        }

        async fn get_mining_info(&self) -> RpcResult<MiningInfo> {
            Ok(MiningInfo {
                blocks: self.state.lock().unwrap().height,
                ..Default::default()
            })
        }

        async fn get_network_info(&self) -> RpcResult<NetworkInfo> {
            Ok(NetworkInfo {
                version: 270_000,
                sub_version: "/Satoshi:27.0.0/".into(),
            })
        }

        async fn get_block_hash(&self, height: u64) -> RpcResult<String> {
            Ok(fake_hash(height))
        }

        async fn get_block(&self, hash: &str) -> RpcResult<BlockInfo> {
            let height = u64::from_str_radix(hash, 16).map_err(|e| RpcError::Parse(e.to_string()))?;
            Ok(BlockInfo {
                hash: hash.to_string(),
                size: 285,
                height,
                tx: vec![fake_hash(1_000_000 + height), fake_hash(2)],
            })
        }

        async fn get_tx_out(&self, _txid: &str, _vout: u32) -> RpcResult<Option<TxOutInfo>> {
            let mut state = self.state.lock().unwrap();
            if state.spent_coinbases > 0 {
                state.spent_coinbases -= 1;
                return Ok(None);
            }
            Ok(Some(TxOutInfo {
                value: 50.0,
                script_pub_key: ScriptPubKey {
                    hex: SCRIPT_HEX.into(),
                },
                confirmations: 101,
            }))
        }

        async fn send_raw_transaction(&self, tx_hex: &str) -> RpcResult<String> {
            let mut state = self.state.lock().unwrap();
            if let Some((code, message)) = state.reject_sends.clone() {
                return Err(RpcError::Rpc { code, message });
            }
            state.sent.push(tx_hex.to_string());
            Ok(fake_hash(3_000_000 + state.sent.len() as u64))
        }

        async fn get_raw_mempool(&self) -> RpcResult<Vec<String>> {
            let count = self.state.lock().unwrap().mempool;
            Ok((0..count as u64).map(fake_hash).collect())
        }

        async fn get_new_address(&self) -> RpcResult<String> {
            Ok("mvHarnessAddress".into())
        }

        async fn address_script(&self, _address: &str) -> RpcResult<String> {
            Ok(SCRIPT_HEX.into())
        }

        async fn sign_raw_transaction(&self, tx_hex: &str) -> RpcResult<SignedTx> {
            Ok(SignedTx {
                hex: tx_hex.to_string(),
                complete: !self.state.lock().unwrap().incomplete_signing,
                errors: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<SpendableOutput>>);

    #[async_trait]
    impl OutputSink for VecSink {
        async fn push(&self, output: SpendableOutput) -> Result<()> {
            self.0.lock().unwrap().push(output);
            Ok(())
        }

        fn len(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    async fn processor(chain: FakeChain) -> RpcProcessor<FakeChain> {
        RpcProcessor::connect(chain, Backend::Btc, 3_000).await.unwrap()
    }

    fn output(value: u64) -> SpendableOutput {
        SpendableOutput {
            txid: fake_hash(42).parse().unwrap(),
            vout: 1,
            value,
            script_pubkey_hex: SCRIPT_HEX.into(),
        }
    }

    #[tokio::test]
    async fn test_prepare_fills_sink_from_nested_splits() {
        let processor = processor(FakeChain::at_height(0)).await;
        let sink = VecSink::default();

        processor.prepare_utxos(&sink, 50).await.unwrap();

        let outputs = sink.0.lock().unwrap().clone();
        assert_eq!(outputs.len(), 50);
        // one root split, then 21 + 21 + 8 leaves from three branch splits
        assert_eq!(processor.rpc.sent().len(), 4);

        let branch = COINBASE_SAT / 21;
        let leaf = branch / 21;
        assert_eq!(outputs[0].value, leaf);
        assert_eq!(outputs[0].vout, 0);
        assert_eq!(outputs[20].value, branch - 20 * leaf - 3_000);
        assert_eq!(outputs[20].vout, 20);
        assert_eq!(outputs[21].vout, 0);
        assert_ne!(outputs[0].txid, outputs[21].txid);
        assert!(outputs.iter().all(|o| o.script_pubkey_hex == SCRIPT_HEX));

        // 101 maturity blocks, one per coinbase lookup, one to confirm
        assert_eq!(processor.block_height().await.unwrap(), 103);
    }

    #[tokio::test]
    async fn test_spent_coinbase_mines_another_block() {
        let chain = FakeChain::at_height(200);
        chain.state.lock().unwrap().spent_coinbases = 2;
        let processor = processor(chain).await;

        let coinbase = processor.mature_coinbase().await.unwrap();
        assert_eq!(coinbase.value, COINBASE_SAT);
        assert_eq!(coinbase.vout, 0);
        assert_eq!(coinbase.txid.to_string(), fake_hash(1_000_000 + 103));
        assert_eq!(processor.block_height().await.unwrap(), 203);
    }

    #[tokio::test]
    async fn test_coinbase_search_gives_up() {
        let chain = FakeChain::at_height(200);
        chain.state.lock().unwrap().spent_coinbases = u32::MAX;
        let processor = processor(chain).await;

        let err = processor.mature_coinbase().await.unwrap_err();
        assert_eq!(
            err,
            ProcessorError::NoSpendableCoinbase {
                attempts: MAX_COINBASE_ATTEMPTS
            }
        );
    }

    #[tokio::test]
    async fn test_root_script_failure_is_skipped_then_bounded() {
        let chain = FakeChain::at_height(200);
        chain.state.lock().unwrap().reject_sends =
            Some((-26, "mandatory-script-verify-flag-failed (Signature must be zero)".into()));
        let processor = processor(chain).await;

        let err = processor
            .prepare_utxos(&VecSink::default(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Rpc { code: -26, .. }));
        // first attempt plus the tolerated rejections, one coinbase each
        assert_eq!(
            processor.block_height().await.unwrap(),
            200 + u64::from(MAX_ROOT_REJECTIONS) + 1
        );
    }

    #[tokio::test]
    async fn test_self_paying_tx_pays_value_minus_fee_to_same_script() {
        let processor = processor(FakeChain::default()).await;

        let submitted = processor
            .submit_self_paying_single_output_tx(&output(10_000))
            .await
            .unwrap();

        assert_eq!(submitted.value, 7_000);
        assert_eq!(submitted.txid.to_string(), fake_hash(3_000_001));
        let sent = processor.rpc.sent();
        assert_eq!(sent.len(), 1);
        let tail = format!("{}19{SCRIPT_HEX}00000000", hex::encode(7_000u64.to_le_bytes()));
        assert!(sent[0].ends_with(&tail), "{}", sent[0]);
    }

    #[tokio::test]
    async fn test_output_below_fee_is_not_sent() {
        let processor = processor(FakeChain::default()).await;

        let err = processor
            .submit_self_paying_single_output_tx(&output(3_000))
            .await
            .unwrap_err();

        assert!(err.is_terminal());
        assert!(processor.rpc.sent().is_empty());
    }

    #[tokio::test]
    async fn test_node_rejection_is_classified() {
        let chain = FakeChain::default();
        chain.state.lock().unwrap().reject_sends = Some((-26, "txn-mempool-conflict".into()));
        let processor = processor(chain).await;

        let err = processor
            .submit_self_paying_single_output_tx(&output(10_000))
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_incomplete_signature_is_not_sent() {
        let chain = FakeChain::default();
        chain.state.lock().unwrap().incomplete_signing = true;
        let processor = processor(chain).await;

        let err = processor
            .submit_self_paying_single_output_tx(&output(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Signing(_)));
        assert!(processor.rpc.sent().is_empty());
    }

    #[tokio::test]
    async fn test_block_queries() {
        let chain = FakeChain::at_height(5);
        chain.state.lock().unwrap().mempool = 7;
        let processor = processor(chain).await;

        let block = processor.generate_block().await.unwrap();
        assert_eq!(block, fake_hash(6));

        let size = processor
            .get_block_size(&block.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(size, BlockSize { size_bytes: 285, tx_count: 2 });
        assert_eq!(processor.get_mempool_size().await.unwrap(), 7);
    }
}
