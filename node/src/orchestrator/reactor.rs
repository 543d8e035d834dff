use std::sync::Arc;

use brvs_ledger::{BlockSubscription, LedgerError};
use brvs_store::VerdictStore;
use brvs_transactions::Block;
use brvs_types::Verdict;
use tokio::sync::broadcast;
use tracing::{debug, error, info, Instrument};

use crate::admission::AdmissionCache;
use crate::metrics::BrvsMetrics;
use crate::plugin::BlockReaction;
use crate::tracing_spans::block_react_span;
use crate::NodeError;

/// Failure reason recorded for pending hashes the ledger refused to commit.
pub const LEDGER_REJECTION_REASON: &str = "rejected by ledger";

/// Reacts to committed blocks: plugins first, then lock release.
pub struct BlockReactor {
    admission: Arc<AdmissionCache>,
    verdicts: Arc<dyn VerdictStore>,
    plugins: Vec<Arc<dyn BlockReaction>>,
    metrics: Arc<BrvsMetrics>,
}

impl BlockReactor {
    pub fn new(
        admission: Arc<AdmissionCache>,
        verdicts: Arc<dyn VerdictStore>,
        plugins: Vec<Arc<dyn BlockReaction>>,
        metrics: Arc<BrvsMetrics>,
    ) -> Self {
        Self {
            admission,
            verdicts,
            plugins,
            metrics,
        }
    }

    /// Consume `subscription` until shutdown. Each block is acknowledged only
    /// after it has been fully processed. A closed stream is an error.
    pub async fn run(
        self,
        mut subscription: BlockSubscription,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NodeError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("block reactor shutting down");
                    subscription.close();
                    return Ok(());
                }
                delivery = subscription.recv() => {
                    let Some(delivery) = delivery else {
                        error!("block stream closed");
                        return Err(LedgerError::StreamClosed.into());
                    };
                    self.process_block(&delivery.block).await?;
                    delivery.ack();
                }
            }
        }
    }

    /// Run every plugin on the block's transactions, then release the locks
    /// held by committed and ledger-rejected hashes. Ledger-rejected hashes
    /// still pending here are marked failed.
    pub async fn process_block(&self, block: &Block) -> Result<(), NodeError> {
        let span = block_react_span(block.height);
        self.react(block).instrument(span).await
    }

    async fn react(&self, block: &Block) -> Result<(), NodeError> {
        for plugin in &self.plugins {
            plugin.react(&block.transactions).await.map_err(|e| {
                error!(plugin = plugin.plugin_name(), error = %e, "block plugin failed");
                e
            })?;
        }

        let mut released = 0;
        for hash in block.committed_hashes() {
            released += self.admission.release_hash(&hash).await?;
        }
        for hash in &block.rejected_transaction_hashes {
            let failed = Verdict::Failed(LEDGER_REJECTION_REASON.to_string());
            if self.verdicts.mark_terminal_if_pending(hash, failed)? {
                self.metrics.verdicts_failed.inc();
            }
            released += self.admission.release_hash(hash).await?;
        }

        self.metrics.blocks_processed.inc();
        self.metrics
            .locked_accounts
            .set(self.admission.locked_accounts().await.len() as i64);
        self.metrics
            .queued_batches
            .set(self.admission.queued_len().await as i64);
        debug!(
            transactions = block.transactions.len(),
            rejected = block.rejected_transaction_hashes.len(),
            released,
            "block processed"
        );
        Ok(())
    }
}
