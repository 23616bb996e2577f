//! # Node Processor Port
//!
//! The capability set every chain backend offers to the harness. Subsystems
//! hold an `Arc<dyn NodeProcessor>` and never depend on backend identity.

use async_trait::async_trait;

use crate::entities::{BlockSize, Hash256, SpendableOutput, SubmittedTx};
use crate::errors::ProcessorError;

/// Result type alias for processor operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Destination for outputs created during UTXO preparation.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Insert an output, waiting while the sink is full.
    async fn push(&self, output: SpendableOutput) -> Result<()>;

    /// Number of outputs currently held.
    fn len(&self) -> usize;

    /// Whether the sink holds no outputs.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Chain backend operations consumed by the broadcaster, the block listener
/// and the miner simulator.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    /// Fill `sink` with spendable outputs until it holds `target` entries.
    async fn prepare_utxos(&self, sink: &dyn OutputSink, target: usize) -> Result<()>;

    /// Spend `output` into a single output paying back to the same key.
    async fn submit_self_paying_single_output_tx(
        &self,
        output: &SpendableOutput,
    ) -> Result<SubmittedTx>;

    /// Mine one block and return its id.
    async fn generate_block(&self) -> Result<String>;

    /// Size and transaction count of a block.
    async fn get_block_size(&self, block_hash: &Hash256) -> Result<BlockSize>;

    /// Number of transactions currently in the mempool.
    ///
    /// Optional: backends without it only degrade stats logging.
    async fn get_mempool_size(&self) -> Result<u64> {
        Err(ProcessorError::Unsupported("get_mempool_size"))
    }
}
