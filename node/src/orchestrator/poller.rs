use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use brvs_ledger::LedgerGateway;
use brvs_store::{AccountRegistry, VerdictStore};
use brvs_transactions::TransactionBatch;
use brvs_types::{AccountId, PublicKey};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

use crate::admission::{AdmissionCache, Offer};
use crate::metrics::BrvsMetrics;
use crate::tracing_spans::{admission_offer_span, pending_poll_span};
use crate::NodeError;

/// Counts from one poll pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub batches: usize,
    /// Skipped because some registered creator lacks enough user signatures.
    pub not_ready: usize,
    /// Skipped because every member hash already had a verdict.
    pub known: usize,
    /// Skipped because members do not match the batch metadata they carry.
    pub malformed: usize,
    pub offered: usize,
}

/// Polls the ledger for pending batches of registered accounts.
pub struct PendingPoller {
    ledger: Arc<dyn LedgerGateway>,
    registry: Arc<dyn AccountRegistry>,
    verdicts: Arc<dyn VerdictStore>,
    admission: Arc<AdmissionCache>,
    metrics: Arc<BrvsMetrics>,
    brvs_key: PublicKey,
    redundancy_factor: u32,
    interval: Duration,
}

impl PendingPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        registry: Arc<dyn AccountRegistry>,
        verdicts: Arc<dyn VerdictStore>,
        admission: Arc<AdmissionCache>,
        metrics: Arc<BrvsMetrics>,
        brvs_key: PublicKey,
        redundancy_factor: u32,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            registry,
            verdicts,
            admission,
            metrics,
            brvs_key,
            redundancy_factor: redundancy_factor.max(1),
            // A zero period makes `tokio::time::interval` panic.
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Poll until shutdown. Any gateway or store error ends the loop.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), NodeError> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("pending poller shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "pending poll failed");
                        return Err(e);
                    }
                }
            }
        }
    }

    /// One poll pass over every registered account.
    pub async fn poll_once(&self) -> Result<PollReport, NodeError> {
        let accounts = self.registry.registered_accounts()?;
        let span = pending_poll_span(accounts.len());
        self.poll_accounts(&accounts).instrument(span).await
    }

    async fn poll_accounts(&self, accounts: &[AccountId]) -> Result<PollReport, NodeError> {
        let mut report = PollReport::default();
        if accounts.is_empty() {
            return Ok(report);
        }
        let batches = self.ledger.query_pending_batches(accounts).await?;
        report.batches = batches.len();
        let mut thresholds = HashMap::new();
        for batch in batches {
            if let Err(e) = batch.verify_meta() {
                warn!(lead = %batch.lead_hash(), error = %e, "skipping malformed pending batch");
                report.malformed += 1;
                continue;
            }
            if !self.has_user_quorum(&batch, &mut thresholds).await? {
                report.not_ready += 1;
                continue;
            }
            let mut newly_marked = false;
            for hash in batch.hashes() {
                newly_marked |= self.verdicts.mark_pending(&hash)?;
            }
            if !newly_marked {
                report.known += 1;
                continue;
            }
            self.offer(batch).await?;
            report.offered += 1;
        }
        if report.offered > 0 {
            debug!(?report, "pending poll offered batches");
        }
        Ok(report)
    }

    async fn offer(&self, batch: TransactionBatch) -> Result<(), NodeError> {
        let span = admission_offer_span(&batch.lead_hash().to_string(), batch.len());
        self.metrics.batches_offered.inc();
        match self.admission.offer(batch).instrument(span).await? {
            Offer::Admitted => self.metrics.batches_admitted.inc(),
            Offer::Queued { .. } => self.metrics.batches_queued.inc(),
        }
        self.metrics
            .locked_accounts
            .set(self.admission.locked_accounts().await.len() as i64);
        self.metrics
            .queued_batches
            .set(self.admission.queued_len().await as i64);
        Ok(())
    }

    /// Every registered creator must already carry at least its threshold of
    /// distinct non-BRVS signatures, counted across its transactions in the
    /// batch.
    async fn has_user_quorum(
        &self,
        batch: &TransactionBatch,
        thresholds: &mut HashMap<AccountId, usize>,
    ) -> Result<bool, NodeError> {
        let mut keys: HashMap<&AccountId, BTreeSet<PublicKey>> = HashMap::new();
        for tx in batch.transactions() {
            keys.entry(tx.creator())
                .or_default()
                .extend(tx.user_signature_keys(&self.brvs_key));
        }
        for (creator, signers) in keys {
            if !self.registry.is_registered(creator)? {
                continue;
            }
            let threshold = match thresholds.get(creator) {
                Some(t) => *t,
                None => {
                    let t = self.threshold(creator).await?;
                    thresholds.insert(creator.clone(), t);
                    t
                }
            };
            if signers.len() < threshold {
                debug!(%creator, have = signers.len(), need = threshold, "batch not ready");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// User-signature threshold: the registered key count when known,
    /// otherwise the ledger quorum divided by the redundancy factor.
    async fn threshold(&self, account: &AccountId) -> Result<usize, NodeError> {
        if let Some(count) = self.registry.user_key_count(account)? {
            return Ok(count as usize);
        }
        let quorum = self.ledger.account_quorum(account).await?;
        Ok((quorum / self.redundancy_factor).max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_crypto::keypair_from_seed;
    use brvs_nullables::{NullAccountRegistry, NullLedger, NullVerdictStore};
    use brvs_store::RegisteredAccount;
    use brvs_transactions::{Command, Transaction};
    use brvs_types::{Amount, KeyPair, Verdict};

    struct Fixture {
        ledger: Arc<NullLedger>,
        registry: Arc<NullAccountRegistry>,
        verdicts: Arc<NullVerdictStore>,
        poller: PendingPoller,
        rx: tokio::sync::mpsc::Receiver<TransactionBatch>,
        brvs: KeyPair,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(NullLedger::new());
        let registry = Arc::new(NullAccountRegistry::with_accounts([&AccountId::new(
            "alice@d",
        )]));
        let verdicts = Arc::new(NullVerdictStore::new());
        let (admission, rx) = AdmissionCache::new(16);
        let brvs = keypair_from_seed(&[2u8; 32]);
        ledger.create_account(&AccountId::new("alice@d"), 2, &[]);
        let poller = PendingPoller::new(
            ledger.clone(),
            registry.clone(),
            verdicts.clone(),
            Arc::new(admission),
            Arc::new(BrvsMetrics::new()),
            brvs.public.clone(),
            2,
            Duration::from_millis(10),
        );
        Fixture {
            ledger,
            registry,
            verdicts,
            poller,
            rx,
            brvs,
        }
    }

    fn transfer(time: u64) -> Transaction {
        Transaction::new(
            AccountId::new("alice@d"),
            time,
            2,
            vec![Command::TransferAsset {
                src_account_id: AccountId::new("alice@d"),
                dest_account_id: AccountId::new("bob@d"),
                asset_id: "x#d".into(),
                description: String::new(),
                amount: Amount::from_units(1),
            }],
        )
    }

    #[tokio::test]
    async fn ready_batch_is_marked_and_offered_once() {
        let mut f = fixture();
        let user = keypair_from_seed(&[1u8; 32]);
        let batch = TransactionBatch::single(transfer(1).signed_by(&user));
        f.ledger.add_pending(batch.clone());

        let report = f.poller.poll_once().await.unwrap();
        assert_eq!(report.offered, 1);
        assert_eq!(f.rx.try_recv().unwrap(), batch);
        assert_eq!(
            f.verdicts.get_verdict(&batch.lead_hash()).unwrap(),
            Some(Verdict::Pending)
        );

        let again = f.poller.poll_once().await.unwrap();
        assert_eq!(again.offered, 0);
        assert_eq!(again.known, 1);
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsigned_batch_is_not_ready() {
        let mut f = fixture();
        // Only BRVS's own signature, which does not count.
        let batch = TransactionBatch::single(transfer(1).signed_by(&f.brvs));
        f.ledger.add_pending(batch.clone());

        let report = f.poller.poll_once().await.unwrap();
        assert_eq!(report.not_ready, 1);
        assert!(!f.verdicts.has_verdict(&batch.lead_hash()).unwrap());
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registered_key_count_overrides_ledger_quorum() {
        let mut f = fixture();
        f.registry
            .register(RegisteredAccount {
                account_id: AccountId::new("alice@d"),
                user_key_count: Some(2),
            })
            .unwrap();
        let one = keypair_from_seed(&[1u8; 32]);
        let two = keypair_from_seed(&[3u8; 32]);
        let half = TransactionBatch::single(transfer(1).signed_by(&one));
        let full = TransactionBatch::single(transfer(2).signed_by(&one).signed_by(&two));
        f.ledger.add_pending(half);
        f.ledger.add_pending(full.clone());

        let report = f.poller.poll_once().await.unwrap();
        assert_eq!(report.not_ready, 1);
        assert_eq!(report.offered, 1);
        assert_eq!(f.rx.try_recv().unwrap(), full);
    }

    /// Reports a fixed set of pending batches, bypassing regrouping.
    struct FixedBatches(Vec<TransactionBatch>);

    #[async_trait::async_trait]
    impl LedgerGateway for FixedBatches {
        async fn query_pending_transactions(
            &self,
            _accounts: &[AccountId],
        ) -> Result<Vec<Transaction>, brvs_ledger::LedgerError> {
            Ok(Vec::new())
        }

        async fn query_pending_batches(
            &self,
            _accounts: &[AccountId],
        ) -> Result<Vec<TransactionBatch>, brvs_ledger::LedgerError> {
            Ok(self.0.clone())
        }

        async fn subscribe_blocks(
            &self,
        ) -> Result<brvs_ledger::BlockSubscription, brvs_ledger::LedgerError> {
            Err(brvs_ledger::LedgerError::StreamClosed)
        }

        async fn submit_batch(
            &self,
            _batch: &TransactionBatch,
        ) -> Result<(), brvs_ledger::LedgerError> {
            Ok(())
        }

        async fn account_quorum(&self, _account: &AccountId) -> Result<u32, brvs_ledger::LedgerError> {
            Ok(1)
        }

        async fn account_asset_balance(
            &self,
            _account: &AccountId,
            _asset_id: &str,
        ) -> Result<Amount, brvs_ledger::LedgerError> {
            Ok(Amount::ZERO)
        }

        async fn get_account_detail(
            &self,
            _account: &AccountId,
            _writer: Option<&AccountId>,
            _key: &str,
        ) -> Result<Option<String>, brvs_ledger::LedgerError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn batch_with_foreign_member_is_never_offered() {
        let user = keypair_from_seed(&[1u8; 32]);
        let atomic = TransactionBatch::atomic(vec![
            transfer(1).signed_by(&user),
            transfer(2).signed_by(&user),
        ])
        .unwrap();
        let mut members = atomic.into_transactions();
        members[1] = transfer(3).signed_by(&user);
        let forged = TransactionBatch::new(members).unwrap();

        let verdicts = Arc::new(NullVerdictStore::new());
        let (admission, mut rx) = AdmissionCache::new(4);
        let poller = PendingPoller::new(
            Arc::new(FixedBatches(vec![forged.clone()])),
            Arc::new(NullAccountRegistry::with_accounts([&AccountId::new("alice@d")])),
            verdicts.clone(),
            Arc::new(admission),
            Arc::new(BrvsMetrics::new()),
            keypair_from_seed(&[2u8; 32]).public,
            1,
            Duration::from_millis(10),
        );

        let report = poller.poll_once().await.unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(report.offered, 0);
        assert!(!verdicts.has_verdict(&forged.lead_hash()).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn zero_interval_still_polls() {
        let f = fixture();
        let (admission, _output) = AdmissionCache::new(4);
        let poller = PendingPoller::new(
            f.ledger.clone(),
            f.registry.clone(),
            f.verdicts.clone(),
            Arc::new(admission),
            Arc::new(BrvsMetrics::new()),
            f.brvs.public.clone(),
            2,
            Duration::ZERO,
        );
        f.ledger.fail_queries(true);
        let (_tx, rx) = broadcast::channel(1);
        assert!(matches!(poller.run(rx).await, Err(NodeError::Ledger(_))));
    }

    #[tokio::test]
    async fn gateway_error_is_returned() {
        let f = fixture();
        f.ledger.fail_queries(true);
        assert!(matches!(
            f.poller.poll_once().await,
            Err(NodeError::Ledger(_))
        ));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_fails_on_gateway_error() {
        let f = fixture();
        let (tx, rx) = broadcast::channel(1);
        f.ledger.fail_queries(true);
        let result = f.poller.run(rx).await;
        assert!(result.is_err());
        drop(tx);
    }
}
