//! Drains the admission output, validates each batch and hands it to the signer.

use std::sync::Arc;
use std::time::Instant;

use brvs_rules::RuleEngine;
use brvs_store::VerdictStore;
use brvs_transactions::TransactionBatch;
use brvs_types::{TxHash, Verdict};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn, Instrument};

use crate::metrics::BrvsMetrics;
use crate::orchestrator::ReleaseRequests;
use crate::signer::{SignOutcome, Signer};
use crate::tracing_spans::batch_validate_span;
use crate::NodeError;

#[derive(Clone)]
pub struct ValidationWorker {
    engine: Arc<RuleEngine>,
    signer: Arc<Signer>,
    releases: ReleaseRequests,
    verdicts: Arc<dyn VerdictStore>,
    metrics: Arc<BrvsMetrics>,
    max_in_flight: usize,
}

impl ValidationWorker {
    pub fn new(
        engine: Arc<RuleEngine>,
        signer: Arc<Signer>,
        releases: ReleaseRequests,
        verdicts: Arc<dyn VerdictStore>,
        metrics: Arc<BrvsMetrics>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            engine,
            signer,
            releases,
            verdicts,
            metrics,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Validate admitted batches, at most `max_in_flight` at a time, until
    /// shutdown or until the admission output closes. In-flight validations
    /// are always awaited before returning.
    pub async fn run(
        self,
        mut batches: mpsc::Receiver<TransactionBatch>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NodeError> {
        let mut tasks: JoinSet<Result<(), NodeError>> = JoinSet::new();
        let mut failure = None;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(in_flight = tasks.len(), "validation worker shutting down");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = flatten(joined) {
                        failure = Some(e);
                        break;
                    }
                }
                batch = batches.recv(), if tasks.len() < self.max_in_flight => {
                    let Some(batch) = batch else {
                        info!("admission output closed");
                        break;
                    };
                    let worker = self.clone();
                    tasks.spawn(async move { worker.validate_one(batch).await });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = flatten(joined) {
                failure.get_or_insert(e);
            }
        }
        match failure {
            Some(e) => {
                error!(error = %e, "validation failed");
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Validate one batch and act on the verdict. Rule errors become a
    /// `failed` verdict; only store and ledger errors are returned.
    pub async fn validate_one(&self, batch: TransactionBatch) -> Result<(), NodeError> {
        let span = batch_validate_span(&batch.lead_hash().to_string());
        self.validate(batch).instrument(span).await
    }

    async fn validate(&self, batch: TransactionBatch) -> Result<(), NodeError> {
        let lead = batch.lead_hash();
        let started = Instant::now();
        let verdict = self.engine.validate(&batch).await;
        self.metrics
            .validation_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        let outcome = match verdict {
            Ok(Verdict::Validated) => self.signer.sign_and_send(batch).await?,
            Ok(Verdict::Rejected(reason)) => {
                info!(%reason, "batch rejected by rules");
                self.signer.reject_and_send(batch, &reason).await?
            }
            Ok(other) => {
                let reason = format!("rule engine returned non-terminal verdict {other}");
                self.signer.fail_and_send(batch, &reason).await?
            }
            Err(e) => {
                warn!(error = %e, "batch could not be evaluated");
                self.signer.fail_and_send(batch, &e.to_string()).await?
            }
        };

        // The ledger decided this batch while it waited for admission, so
        // nothing else will release the lock it now holds.
        if let SignOutcome::AlreadyDecided(hash) = outcome {
            let decided = self.verdicts.get_verdict(&hash)?;
            if decided.is_some_and(|v| v.is_rejected_or_failed()) {
                self.request_release(lead);
            }
        }
        Ok(())
    }

    fn request_release(&self, lead: TxHash) {
        if !self.releases.release(lead) {
            warn!(%lead, "release listener stopped, lock stays held");
        }
    }
}

fn flatten(joined: Result<Result<(), NodeError>, JoinError>) -> Result<(), NodeError> {
    joined.map_err(|e| NodeError::TaskFailed {
        task: "validation".into(),
        reason: e.to_string(),
    })?
}
