//! Terminal actuator: records the verdict, then co-signs or poisons and submits.
//!
//! The verdict write always precedes submission. A crash in between leaves the
//! store as the source of truth and the transaction pending on the ledger.

use std::sync::Arc;

use brvs_crypto::poison_keypair;
use brvs_ledger::LedgerGateway;
use brvs_store::VerdictStore;
use brvs_transactions::TransactionBatch;
use brvs_types::{KeyPair, PublicKey, TxHash, Verdict};
use tracing::{info, warn};

use crate::metrics::BrvsMetrics;
use crate::NodeError;

/// What the signer did with a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignOutcome {
    Submitted,
    /// A member already had a terminal verdict; nothing was written or sent.
    AlreadyDecided(TxHash),
}

pub struct Signer {
    ledger: Arc<dyn LedgerGateway>,
    verdicts: Arc<dyn VerdictStore>,
    keypair: KeyPair,
    metrics: Arc<BrvsMetrics>,
}

impl Signer {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        verdicts: Arc<dyn VerdictStore>,
        keypair: KeyPair,
        metrics: Arc<BrvsMetrics>,
    ) -> Self {
        Self {
            ledger,
            verdicts,
            keypair,
            metrics,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// Record `validated` for every member, complete each member's quorum with
    /// the real key, and submit.
    pub async fn sign_and_send(&self, batch: TransactionBatch) -> Result<SignOutcome, NodeError> {
        let outcome = self
            .decide_and_submit(batch, Verdict::Validated, &self.keypair)
            .await?;
        if outcome == SignOutcome::Submitted {
            self.metrics.verdicts_validated.inc();
        }
        Ok(outcome)
    }

    /// Record `rejected(reason)` for every member, sign each member with the
    /// poison key pair, and submit. The ledger is then guaranteed to reject
    /// the batch instead of leaving it pending.
    pub async fn reject_and_send(
        &self,
        batch: TransactionBatch,
        reason: &str,
    ) -> Result<SignOutcome, NodeError> {
        let outcome = self
            .decide_and_submit(batch, Verdict::Rejected(reason.to_string()), &poison_keypair())
            .await?;
        if outcome == SignOutcome::Submitted {
            self.metrics.verdicts_rejected.inc();
        }
        Ok(outcome)
    }

    /// Like [`Signer::reject_and_send`] for batches that could not be
    /// evaluated: records `failed(reason)` and poisons the batch.
    pub async fn fail_and_send(
        &self,
        batch: TransactionBatch,
        reason: &str,
    ) -> Result<SignOutcome, NodeError> {
        let outcome = self
            .decide_and_submit(batch, Verdict::Failed(reason.to_string()), &poison_keypair())
            .await?;
        if outcome == SignOutcome::Submitted {
            self.metrics.verdicts_failed.inc();
        }
        Ok(outcome)
    }

    /// Move every member from `pending` to `verdict`, then sign and submit.
    ///
    /// Each member's transition is one compare-and-set in the store. If any
    /// member was decided elsewhere first (the block reactor failing a hash
    /// the ledger rejected), nothing is submitted.
    async fn decide_and_submit(
        &self,
        mut batch: TransactionBatch,
        verdict: Verdict,
        key: &KeyPair,
    ) -> Result<SignOutcome, NodeError> {
        for hash in batch.hashes() {
            self.verdicts.mark_pending(&hash)?;
            if !self.verdicts.mark_terminal_if_pending(&hash, verdict.clone())? {
                let current = self.verdicts.get_verdict(&hash)?;
                warn!(%hash, ?current, "batch member already decided, not submitting");
                return Ok(SignOutcome::AlreadyDecided(hash));
            }
        }
        for tx in batch.transactions_mut() {
            tx.sign(key);
        }
        self.ledger.submit_batch(&batch).await?;
        info!(
            lead = %batch.lead_hash(),
            size = batch.len(),
            verdict = verdict.label(),
            "batch submitted"
        );
        Ok(SignOutcome::Submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_crypto::keypair_from_seed;
    use brvs_nullables::{NullLedger, NullVerdictStore};
    use brvs_transactions::{Command, Transaction};
    use brvs_types::{AccountId, Amount};

    struct Fixture {
        ledger: Arc<NullLedger>,
        verdicts: Arc<NullVerdictStore>,
        signer: Signer,
        brvs_public: PublicKey,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(NullLedger::new());
        let verdicts = Arc::new(NullVerdictStore::new());
        let brvs = keypair_from_seed(&[2u8; 32]);
        let brvs_public = brvs.public.clone();
        let signer = Signer::new(
            ledger.clone(),
            verdicts.clone(),
            brvs,
            Arc::new(BrvsMetrics::new()),
        );
        Fixture {
            ledger,
            verdicts,
            signer,
            brvs_public,
        }
    }

    fn batch() -> TransactionBatch {
        let user = keypair_from_seed(&[1u8; 32]);
        let tx = Transaction::new(
            AccountId::new("sender@d"),
            1,
            2,
            vec![Command::TransferAsset {
                src_account_id: AccountId::new("sender@d"),
                dest_account_id: AccountId::new("receiver@d"),
                asset_id: "x#d".into(),
                description: String::new(),
                amount: Amount::from_units(100),
            }],
        )
        .signed_by(&user);
        TransactionBatch::single(tx)
    }

    #[tokio::test]
    async fn sign_uses_real_key_only() {
        let f = fixture();
        let b = batch();
        let hash = b.lead_hash();
        f.signer.sign_and_send(b).await.unwrap();

        assert_eq!(f.verdicts.get_verdict(&hash).unwrap(), Some(Verdict::Validated));
        let submissions = f.ledger.submissions();
        let submitted = &submissions[0].transactions()[0];
        assert!(submitted.is_signed_by(&f.brvs_public));
        assert!(!submitted.is_signed_by(&PublicKey::ZERO));
        assert_eq!(submitted.valid_signatures().count(), 2);
    }

    #[tokio::test]
    async fn reject_uses_poison_key_only() {
        let f = fixture();
        let b = batch();
        let hash = b.lead_hash();
        f.signer.reject_and_send(b, "too much").await.unwrap();

        assert_eq!(
            f.verdicts.get_verdict(&hash).unwrap(),
            Some(Verdict::Rejected("too much".into()))
        );
        let submissions = f.ledger.submissions();
        let submitted = &submissions[0].transactions()[0];
        assert!(submitted.is_signed_by(&PublicKey::ZERO));
        assert!(!submitted.is_signed_by(&f.brvs_public));
    }

    #[tokio::test]
    async fn fail_records_failed_and_poisons() {
        let f = fixture();
        let b = batch();
        let hash = b.lead_hash();
        f.signer.fail_and_send(b, "ledger read failed").await.unwrap();
        assert!(matches!(
            f.verdicts.get_verdict(&hash).unwrap(),
            Some(Verdict::Failed(_))
        ));
        assert!(f.ledger.submissions()[0].transactions()[0].is_signed_by(&PublicKey::ZERO));
    }

    #[tokio::test]
    async fn terminal_verdict_is_never_overwritten_or_resubmitted() {
        let f = fixture();
        let b = batch();
        let hash = b.lead_hash();
        f.signer.reject_and_send(b.clone(), "first").await.unwrap();
        let outcome = f.signer.sign_and_send(b).await.unwrap();

        assert_eq!(outcome, SignOutcome::AlreadyDecided(hash));
        assert_eq!(
            f.verdicts.get_verdict(&hash).unwrap(),
            Some(Verdict::Rejected("first".into()))
        );
        assert_eq!(f.ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn verdict_is_recorded_even_if_submission_fails() {
        let f = fixture();
        f.ledger.fail_submissions(true);
        let b = batch();
        let hash = b.lead_hash();
        assert!(f.signer.sign_and_send(b).await.is_err());
        assert_eq!(f.verdicts.get_verdict(&hash).unwrap(), Some(Verdict::Validated));
    }
}
