//! Per-account admission scheduling.
//!
//! The cache guarantees that at most one balance-affecting batch per account is
//! in flight through validation, while never dropping or reordering work for
//! an account.
//!
//! A batch *references* every account that created one of its transactions and
//! *locks* the creators of transfer-carrying members. It is emitted only when
//! none of its referenced accounts is locked and it is the oldest waiting batch
//! for each of them. Batches that cannot go yet wait in per-account FIFO queues
//! keyed by arrival sequence. Locks are keyed by the batch's lead hash and are
//! dropped when that hash is observed as committed, rejected or failed.
//!
//! All state sits behind one mutex. A second mutex orders emission: it is
//! taken before the state mutex is released, so batches reach the output
//! channel in the order they were admitted. Sends happen with only the
//! emission mutex held. Consumers of the output must not call back into the
//! cache while the channel is full.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use brvs_transactions::TransactionBatch;
use brvs_types::{AccountId, TxHash};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("account {0} is not locked")]
    NotLocked(AccountId),

    #[error("admission output channel is closed")]
    OutputClosed,
}

/// What `offer` did with a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Offer {
    /// Emitted immediately.
    Admitted,
    /// Held back. `blocked_by` lists the referenced accounts that are locked
    /// or already have older batches waiting.
    Queued { blocked_by: Vec<AccountId> },
}

struct Waiting {
    batch: TransactionBatch,
    referenced: BTreeSet<AccountId>,
    locking: BTreeSet<AccountId>,
}

#[derive(Default)]
struct AdmissionState {
    locks: HashMap<AccountId, TxHash>,
    queues: HashMap<AccountId, VecDeque<u64>>,
    waiting: BTreeMap<u64, Waiting>,
    next_seq: u64,
}

impl AdmissionState {
    fn is_free(&self, account: &AccountId) -> bool {
        !self.locks.contains_key(account)
            && self.queues.get(account).map_or(true, VecDeque::is_empty)
    }

    fn lock(&mut self, accounts: &BTreeSet<AccountId>, lead: TxHash) {
        for account in accounts {
            self.locks.insert(account.clone(), lead);
        }
    }

    fn enqueue(&mut self, waiting: Waiting) {
        let seq = self.next_seq;
        self.next_seq += 1;
        for account in &waiting.referenced {
            self.queues.entry(account.clone()).or_default().push_back(seq);
        }
        self.waiting.insert(seq, waiting);
    }

    fn is_admissible(&self, seq: u64, waiting: &Waiting) -> bool {
        waiting.referenced.iter().all(|account| {
            !self.locks.contains_key(account)
                && self.queues.get(account).and_then(VecDeque::front) == Some(&seq)
        })
    }

    /// Admit every waiting batch that became admissible, oldest first.
    ///
    /// A single ascending pass suffices: admitting a batch only adds locks
    /// and pops queue heads, which can unblock younger batches but never
    /// older ones.
    fn drain(&mut self) -> Vec<TransactionBatch> {
        let mut admitted = Vec::new();
        let seqs: Vec<u64> = self.waiting.keys().copied().collect();
        for seq in seqs {
            let ready = self
                .waiting
                .get(&seq)
                .is_some_and(|waiting| self.is_admissible(seq, waiting));
            if !ready {
                continue;
            }
            let Some(waiting) = self.waiting.remove(&seq) else {
                continue;
            };
            for account in &waiting.referenced {
                if let Some(queue) = self.queues.get_mut(account) {
                    queue.pop_front();
                    if queue.is_empty() {
                        self.queues.remove(account);
                    }
                }
            }
            self.lock(&waiting.locking, waiting.batch.lead_hash());
            admitted.push(waiting.batch);
        }
        admitted
    }

    fn unlock_hash(&mut self, hash: &TxHash) -> Vec<AccountId> {
        let mut released: Vec<AccountId> = self
            .locks
            .iter()
            .filter(|(_, locked)| *locked == hash)
            .map(|(account, _)| account.clone())
            .collect();
        released.sort();
        for account in &released {
            self.locks.remove(account);
        }
        released
    }
}

/// The per-account locking scheduler between the pending poller and the
/// validation worker.
pub struct AdmissionCache {
    state: Mutex<AdmissionState>,
    emit_order: Mutex<()>,
    output: mpsc::Sender<TransactionBatch>,
}

impl AdmissionCache {
    /// Create a cache emitting onto a bounded channel of `capacity` batches.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TransactionBatch>) {
        let (output, rx) = mpsc::channel(capacity);
        (Self::with_output(output), rx)
    }

    pub fn with_output(output: mpsc::Sender<TransactionBatch>) -> Self {
        Self {
            state: Mutex::new(AdmissionState::default()),
            emit_order: Mutex::new(()),
            output,
        }
    }

    /// Offer a newly observed batch.
    ///
    /// If every referenced account is free the batch's locking accounts are
    /// locked to its lead hash and it is emitted at once. Otherwise it waits
    /// behind the accounts that block it.
    pub async fn offer(&self, batch: TransactionBatch) -> Result<Offer, AdmissionError> {
        let waiting = Waiting {
            referenced: batch.creators(),
            locking: batch.transfer_creators(),
            batch,
        };
        let mut state = self.state.lock().await;
        let blocked_by: Vec<AccountId> = waiting
            .referenced
            .iter()
            .filter(|account| !state.is_free(account))
            .cloned()
            .collect();
        if !blocked_by.is_empty() {
            debug!(
                lead = %waiting.batch.lead_hash(),
                blocked_by = ?blocked_by,
                "batch queued behind busy accounts"
            );
            state.enqueue(waiting);
            return Ok(Offer::Queued { blocked_by });
        }
        state.lock(&waiting.locking, waiting.batch.lead_hash());
        self.emit(state, vec![waiting.batch]).await?;
        Ok(Offer::Admitted)
    }

    /// Unlock `account` and emit whatever became admissible.
    ///
    /// Releasing an account that holds no lock is a caller bug and is
    /// reported as [`AdmissionError::NotLocked`]. Returns the number of
    /// batches emitted.
    pub async fn release(&self, account: &AccountId) -> Result<usize, AdmissionError> {
        let mut state = self.state.lock().await;
        if state.locks.remove(account).is_none() {
            error!(%account, "release of an account that holds no lock");
            return Err(AdmissionError::NotLocked(account.clone()));
        }
        let admitted = state.drain();
        self.emit(state, admitted).await
    }

    /// Release every account locked to `hash` and emit whatever became
    /// admissible, in one critical section. Unknown hashes are a no-op.
    pub async fn release_hash(&self, hash: &TxHash) -> Result<usize, AdmissionError> {
        let mut state = self.state.lock().await;
        let released = state.unlock_hash(hash);
        if released.is_empty() {
            return Ok(0);
        }
        debug!(%hash, accounts = ?released, "released admission locks");
        let admitted = state.drain();
        self.emit(state, admitted).await
    }

    /// Accounts whose lock is held by the batch led by `hash`.
    pub async fn who_blocks(&self, hash: &TxHash) -> Vec<AccountId> {
        let state = self.state.lock().await;
        let mut accounts: Vec<AccountId> = state
            .locks
            .iter()
            .filter(|(_, locked)| *locked == hash)
            .map(|(account, _)| account.clone())
            .collect();
        accounts.sort();
        accounts
    }

    pub async fn locked_accounts(&self) -> Vec<AccountId> {
        let state = self.state.lock().await;
        let mut accounts: Vec<AccountId> = state.locks.keys().cloned().collect();
        accounts.sort();
        accounts
    }

    /// Distinct lead hashes currently holding locks.
    pub async fn locked_hashes(&self) -> BTreeSet<TxHash> {
        self.state.lock().await.locks.values().copied().collect()
    }

    pub async fn queued_len(&self) -> usize {
        self.state.lock().await.waiting.len()
    }

    /// Send `batches`, admitted under `state`, after every batch admitted
    /// before them.
    async fn emit(
        &self,
        state: MutexGuard<'_, AdmissionState>,
        batches: Vec<TransactionBatch>,
    ) -> Result<usize, AdmissionError> {
        if batches.is_empty() {
            return Ok(0);
        }
        let _order = self.emit_order.lock().await;
        drop(state);
        let count = batches.len();
        for batch in batches {
            self.output
                .send(batch)
                .await
                .map_err(|_| AdmissionError::OutputClosed)?;
        }
        Ok(count)
    }
}
