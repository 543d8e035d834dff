//! Ledger gateway trait.

use async_trait::async_trait;
use brvs_transactions::{regroup, Transaction, TransactionBatch};
use brvs_types::{AccountId, Amount};

use crate::{BlockSubscription, LedgerError};

/// Everything BRVS consumes from the ledger peer.
///
/// Implementations own retry and backoff for transient failures. An error
/// returned here is final as far as the pipeline is concerned.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Raw pending (not yet committed) transactions created by, or awaiting a
    /// signature from, any of `accounts`. The same transaction may be reported
    /// more than once.
    async fn query_pending_transactions(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Pending transactions regrouped into batches using the size hint
    /// carried by each batch's first member.
    ///
    /// A batch whose members are not all pending yet is left out; it is
    /// picked up by a later poll once complete.
    async fn query_pending_batches(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<TransactionBatch>, LedgerError> {
        let raw = self.query_pending_transactions(accounts).await?;
        let (batches, held_back) = regroup(raw);
        if !held_back.is_empty() {
            tracing::warn!(
                held_back = held_back.len(),
                "skipping pending members of incomplete batches"
            );
        }
        Ok(batches)
    }

    /// Open a new subscription to the committed-block stream.
    async fn subscribe_blocks(&self) -> Result<BlockSubscription, LedgerError>;

    /// Submit a (possibly re-signed) batch.
    async fn submit_batch(&self, batch: &TransactionBatch) -> Result<(), LedgerError>;

    /// Signature quorum currently configured for `account`.
    async fn account_quorum(&self, account: &AccountId) -> Result<u32, LedgerError>;

    async fn account_asset_balance(
        &self,
        account: &AccountId,
        asset_id: &str,
    ) -> Result<Amount, LedgerError>;

    /// Detail `key` stored on `account`, restricted to entries written by
    /// `writer` when given.
    async fn get_account_detail(
        &self,
        account: &AccountId,
        writer: Option<&AccountId>,
        key: &str,
    ) -> Result<Option<String>, LedgerError>;
}
