use std::sync::Arc;

use brvs_store::VerdictStore;
use brvs_types::TxHash;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::admission::AdmissionCache;
use crate::metrics::BrvsMetrics;
use crate::NodeError;

/// Handle for asking the [`ReleaseListener`] to drop the locks of a lead
/// hash. Sending never waits, so callers cannot be stalled by a full
/// admission output channel.
#[derive(Clone)]
pub struct ReleaseRequests {
    tx: mpsc::UnboundedSender<TxHash>,
}

impl ReleaseRequests {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TxHash>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` if the listener is gone.
    pub fn release(&self, hash: TxHash) -> bool {
        self.tx.send(hash).is_ok()
    }
}

/// Releases admission locks as hashes are marked rejected or failed, and on
/// explicit [`ReleaseRequests`].
///
/// Subscribes on construction, so no announcement made after [`ReleaseListener::new`]
/// returns can be missed. If the listener falls behind, it reconciles every
/// locked hash against the verdict store instead.
pub struct ReleaseListener {
    admission: Arc<AdmissionCache>,
    verdicts: Arc<dyn VerdictStore>,
    metrics: Arc<BrvsMetrics>,
    events: broadcast::Receiver<TxHash>,
    requests: mpsc::UnboundedReceiver<TxHash>,
}

impl ReleaseListener {
    pub fn new(
        admission: Arc<AdmissionCache>,
        verdicts: Arc<dyn VerdictStore>,
        metrics: Arc<BrvsMetrics>,
        requests: mpsc::UnboundedReceiver<TxHash>,
    ) -> Self {
        let events = verdicts.subscribe_rejected_or_failed();
        Self {
            admission,
            verdicts,
            metrics,
            events,
            requests,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), NodeError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("release listener shutting down");
                    return Ok(());
                }
                Some(hash) = self.requests.recv() => {
                    self.release(&hash).await?;
                }
                event = self.events.recv() => match event {
                    Ok(hash) => {
                        self.release(&hash).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "release listener lagged, reconciling");
                        self.reconcile().await?;
                    }
                    Err(RecvError::Closed) => {
                        info!("verdict event stream closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn release(&self, hash: &TxHash) -> Result<(), NodeError> {
        let released = self.admission.release_hash(hash).await?;
        if released > 0 {
            debug!(%hash, released, "released locks, admitted waiting batches");
        }
        self.update_gauges().await;
        Ok(())
    }

    /// Release every locked hash whose verdict is already rejected or failed.
    /// Returns the number of hashes released.
    pub async fn reconcile(&self) -> Result<usize, NodeError> {
        let mut released = 0;
        for hash in self.admission.locked_hashes().await {
            let verdict = self.verdicts.get_verdict(&hash)?;
            if verdict.is_some_and(|v| v.is_rejected_or_failed()) {
                self.admission.release_hash(&hash).await?;
                released += 1;
            }
        }
        self.update_gauges().await;
        Ok(released)
    }

    async fn update_gauges(&self) {
        self.metrics
            .locked_accounts
            .set(self.admission.locked_accounts().await.len() as i64);
        self.metrics
            .queued_batches
            .set(self.admission.queued_len().await as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_nullables::NullVerdictStore;
    use brvs_transactions::{Command, Transaction, TransactionBatch};
    use brvs_types::{AccountId, Amount};
    use std::time::Duration;

    fn transfer(creator: &str, time: u64) -> Transaction {
        Transaction::new(
            AccountId::new(creator),
            time,
            1,
            vec![Command::TransferAsset {
                src_account_id: AccountId::new(creator),
                dest_account_id: AccountId::new("bob@d"),
                asset_id: "x#d".into(),
                description: String::new(),
                amount: Amount::from_units(1),
            }],
        )
    }

    #[tokio::test]
    async fn failed_verdict_releases_and_admits_next() {
        let (admission, mut output) = AdmissionCache::new(16);
        let admission = Arc::new(admission);
        let verdicts = Arc::new(NullVerdictStore::new());
        let (_requests, requests_rx) = ReleaseRequests::channel();
        let listener = ReleaseListener::new(
            admission.clone(),
            verdicts.clone(),
            Arc::new(BrvsMetrics::new()),
            requests_rx,
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        let first = TransactionBatch::single(transfer("alice@d", 1));
        let second = TransactionBatch::single(transfer("alice@d", 2));
        admission.offer(first.clone()).await.unwrap();
        admission.offer(second.clone()).await.unwrap();
        assert_eq!(output.recv().await.unwrap(), first);

        verdicts.mark_failed(&first.lead_hash(), "boom").unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), output.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, second);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn requested_release_admits_next() {
        let (admission, mut output) = AdmissionCache::new(16);
        let admission = Arc::new(admission);
        let (requests, requests_rx) = ReleaseRequests::channel();
        let listener = ReleaseListener::new(
            admission.clone(),
            Arc::new(NullVerdictStore::new()),
            Arc::new(BrvsMetrics::new()),
            requests_rx,
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        let first = TransactionBatch::single(transfer("alice@d", 1));
        let second = TransactionBatch::single(transfer("alice@d", 2));
        admission.offer(first.clone()).await.unwrap();
        admission.offer(second.clone()).await.unwrap();
        assert_eq!(output.recv().await.unwrap(), first);

        assert!(requests.release(first.lead_hash()));
        let next = tokio::time::timeout(Duration::from_secs(1), output.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, second);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!requests.release(second.lead_hash()));
    }

    #[tokio::test]
    async fn reconcile_releases_hashes_missed_while_lagging() {
        let (admission, _output) = AdmissionCache::new(16);
        let admission = Arc::new(admission);
        let verdicts = Arc::new(NullVerdictStore::with_event_capacity(1));
        let (_requests, requests_rx) = ReleaseRequests::channel();
        let listener = ReleaseListener::new(
            admission.clone(),
            verdicts.clone(),
            Arc::new(BrvsMetrics::new()),
            requests_rx,
        );

        let alice = TransactionBatch::single(transfer("alice@d", 1));
        let carol = TransactionBatch::single(transfer("carol@d", 1));
        admission.offer(alice.clone()).await.unwrap();
        admission.offer(carol.clone()).await.unwrap();
        verdicts.mark_rejected(&alice.lead_hash(), "limit").unwrap();
        verdicts.mark_failed(&carol.lead_hash(), "boom").unwrap();
        assert_eq!(admission.locked_accounts().await.len(), 2);

        assert_eq!(listener.reconcile().await.unwrap(), 2);
        assert!(admission.locked_accounts().await.is_empty());
    }

    #[tokio::test]
    async fn lagged_stream_triggers_reconcile() {
        let (admission, _output) = AdmissionCache::new(16);
        let admission = Arc::new(admission);
        let verdicts = Arc::new(NullVerdictStore::with_event_capacity(1));
        let (_requests, requests_rx) = ReleaseRequests::channel();
        let listener = ReleaseListener::new(
            admission.clone(),
            verdicts.clone(),
            Arc::new(BrvsMetrics::new()),
            requests_rx,
        );
        let hashes: Vec<_> = ["alice@d", "carol@d", "dave@d"]
            .into_iter()
            .map(|creator| TransactionBatch::single(transfer(creator, 1)))
            .collect();
        for batch in &hashes {
            admission.offer(batch.clone()).await.unwrap();
        }
        for batch in &hashes {
            verdicts.mark_failed(&batch.lead_hash(), "boom").unwrap();
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));
        tokio::time::timeout(Duration::from_secs(1), async {
            while !admission.locked_accounts().await.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
