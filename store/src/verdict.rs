//! Verdict storage trait.

use brvs_types::{TxHash, Verdict};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::StoreError;

/// A stored verdict together with its transaction hash, as exported by backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub hash: TxHash,
    pub verdict: Verdict,
}

/// Durable map from transaction hash to the last recorded verdict.
///
/// `mark_pending` is store-if-absent. The unconditional terminal markers
/// replace whatever is stored. The pipeline decides hashes only through
/// [`VerdictStore::mark_terminal_if_pending`], which is the single
/// compare-and-set step keeping verdicts monotone when the signer and the
/// block reactor race on one hash. Every rejected or failed write is
/// announced on the stream returned by
/// [`VerdictStore::subscribe_rejected_or_failed`].
pub trait VerdictStore: Send + Sync {
    /// Whether any verdict is recorded for `hash`.
    fn has_verdict(&self, hash: &TxHash) -> Result<bool, StoreError>;

    /// Record `pending` unless a verdict already exists. Returns `true` iff
    /// this call created the entry.
    fn mark_pending(&self, hash: &TxHash) -> Result<bool, StoreError>;

    fn mark_validated(&self, hash: &TxHash) -> Result<(), StoreError>;

    fn mark_rejected(&self, hash: &TxHash, reason: &str) -> Result<(), StoreError>;

    fn mark_failed(&self, hash: &TxHash, reason: &str) -> Result<(), StoreError>;

    /// Replace a `pending` verdict with the terminal `verdict`, atomically.
    /// Returns `false` and writes nothing when `hash` has no verdict or
    /// already has a terminal one.
    fn mark_terminal_if_pending(
        &self,
        hash: &TxHash,
        verdict: Verdict,
    ) -> Result<bool, StoreError>;

    fn get_verdict(&self, hash: &TxHash) -> Result<Option<Verdict>, StoreError>;

    /// A fresh receiver of hashes marked rejected or failed from now on.
    fn subscribe_rejected_or_failed(&self) -> broadcast::Receiver<TxHash>;
}
