//! Nullable ledger: an in-memory peer that behaves like the real one where the
//! pipeline can observe it.
//!
//! Submitted batches are queued until [`NullLedger::seal_block`] applies them.
//! A transaction commits only if every signature on it verifies, every signer
//! is a signatory of the creator, and the distinct signer count reaches the
//! account quorum. A batch commits atomically: one failing member rejects them
//! all, and the rejected hashes are carried on the block.

use async_trait::async_trait;
use brvs_ledger::{BlockDelivery, BlockSubscription, LedgerError, LedgerGateway};
use brvs_transactions::{Block, Command, Transaction, TransactionBatch};
use brvs_types::{AccountId, Amount, PublicKey};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const SUBSCRIPTION_CAPACITY: usize = 16;

#[derive(Clone, Debug)]
struct AccountState {
    quorum: u32,
    signatories: BTreeSet<PublicKey>,
}

#[derive(Clone, Default)]
struct WorldState {
    accounts: BTreeMap<AccountId, AccountState>,
    balances: BTreeMap<(AccountId, String), Amount>,
    /// (account, writer, key) -> value
    details: BTreeMap<(AccountId, AccountId, String), String>,
}

impl WorldState {
    fn balance(&self, account: &AccountId, asset: &str) -> Amount {
        self.balances
            .get(&(account.clone(), asset.to_string()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    fn credit(&mut self, account: &AccountId, asset: &str, amount: Amount) -> Result<(), String> {
        let next = self
            .balance(account, asset)
            .checked_add(amount)
            .ok_or_else(|| format!("balance overflow on {account}"))?;
        self.balances
            .insert((account.clone(), asset.to_string()), next);
        Ok(())
    }

    fn debit(&mut self, account: &AccountId, asset: &str, amount: Amount) -> Result<(), String> {
        let next = self
            .balance(account, asset)
            .checked_sub(amount)
            .ok_or_else(|| format!("insufficient {asset} on {account}"))?;
        self.balances
            .insert((account.clone(), asset.to_string()), next);
        Ok(())
    }

    fn account_mut(&mut self, account: &AccountId) -> Result<&mut AccountState, String> {
        self.accounts
            .get_mut(account)
            .ok_or_else(|| format!("no account {account}"))
    }

    fn check_signatures(&self, tx: &Transaction) -> Result<(), String> {
        let creator = tx.creator();
        let account = self
            .accounts
            .get(creator)
            .ok_or_else(|| format!("no account {creator}"))?;
        if tx.valid_signatures().count() != tx.signature_count() {
            return Err("invalid signature".into());
        }
        let signers: BTreeSet<&PublicKey> = tx.signatures.iter().map(|s| &s.public_key).collect();
        if let Some(stranger) = signers.iter().find(|k| !account.signatories.contains(**k)) {
            return Err(format!("{stranger} is not a signatory of {creator}"));
        }
        if (signers.len() as u32) < account.quorum {
            return Err(format!(
                "{} of {} signatures on {creator}",
                signers.len(),
                account.quorum
            ));
        }
        Ok(())
    }

    fn apply(&mut self, tx: &Transaction) -> Result<(), String> {
        let creator = tx.creator().clone();
        for command in &tx.commands {
            match command {
                Command::TransferAsset {
                    src_account_id,
                    dest_account_id,
                    asset_id,
                    amount,
                    ..
                } => {
                    self.debit(src_account_id, asset_id, *amount)?;
                    self.credit(dest_account_id, asset_id, *amount)?;
                }
                Command::AddAssetQuantity { asset_id, amount } => {
                    self.credit(&creator, asset_id, *amount)?;
                }
                Command::SubtractAssetQuantity { asset_id, amount } => {
                    self.debit(&creator, asset_id, *amount)?;
                }
                Command::SetAccountDetail {
                    account_id,
                    key,
                    value,
                } => {
                    self.details
                        .insert((account_id.clone(), creator.clone(), key.clone()), value.clone());
                }
                Command::AddSignatory {
                    account_id,
                    public_key,
                } => {
                    self.account_mut(account_id)?
                        .signatories
                        .insert(public_key.clone());
                }
                Command::RemoveSignatory {
                    account_id,
                    public_key,
                } => {
                    self.account_mut(account_id)?.signatories.remove(public_key);
                }
                Command::SetAccountQuorum { account_id, quorum } => {
                    self.account_mut(account_id)?.quorum = *quorum;
                }
                Command::CreateAccount {
                    account_name,
                    domain_id,
                    public_key,
                } => {
                    let id = AccountId::parse(format!("{account_name}@{domain_id}"))
                        .map_err(|e| e.to_string())?;
                    if self.accounts.contains_key(&id) {
                        return Err(format!("account {id} already exists"));
                    }
                    self.accounts.insert(
                        id,
                        AccountState {
                            quorum: 1,
                            signatories: BTreeSet::from([public_key.clone()]),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    world: WorldState,
    pending: Vec<Transaction>,
    queued: Vec<TransactionBatch>,
    submissions: Vec<TransactionBatch>,
    height: u64,
    fail_queries: bool,
    fail_submissions: bool,
}

/// An in-memory ledger peer for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullLedger {
    state: Mutex<LedgerState>,
    subscribers: Mutex<Vec<mpsc::Sender<BlockDelivery>>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Create an account with the given signature quorum and signatories.
    pub fn create_account(&self, account: &AccountId, quorum: u32, signatories: &[PublicKey]) {
        self.state.lock().unwrap().world.accounts.insert(
            account.clone(),
            AccountState {
                quorum,
                signatories: signatories.iter().cloned().collect(),
            },
        );
    }

    pub fn set_balance(&self, account: &AccountId, asset_id: &str, amount: Amount) {
        self.state
            .lock()
            .unwrap()
            .world
            .balances
            .insert((account.clone(), asset_id.to_string()), amount);
    }

    pub fn balance(&self, account: &AccountId, asset_id: &str) -> Amount {
        self.state.lock().unwrap().world.balance(account, asset_id)
    }

    /// Write an account detail directly, as if committed by `writer`.
    pub fn set_account_detail(&self, account: &AccountId, writer: &AccountId, key: &str, value: &str) {
        self.state.lock().unwrap().world.details.insert(
            (account.clone(), writer.clone(), key.to_string()),
            value.to_string(),
        );
    }

    /// Make a batch visible as pending (partially signed, awaiting co-signers).
    pub fn add_pending(&self, batch: TransactionBatch) {
        self.state
            .lock()
            .unwrap()
            .pending
            .extend(batch.into_transactions());
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Every batch submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<TransactionBatch> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn height(&self) -> u64 {
        self.state.lock().unwrap().height
    }

    /// Make pending queries fail until reset.
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    /// Make submissions fail until reset.
    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submissions = fail;
    }

    /// Apply every queued submission and return the resulting block without
    /// publishing it.
    pub fn seal_block(&self) -> Block {
        let mut state = self.state.lock().unwrap();
        let queued = std::mem::take(&mut state.queued);
        let mut committed = Vec::new();
        let mut rejected = Vec::new();
        for batch in queued {
            let mut world = state.world.clone();
            let outcome = batch.transactions().iter().try_for_each(|tx| {
                world.check_signatures(tx)?;
                world.apply(tx)
            });
            match outcome {
                Ok(()) => {
                    state.world = world;
                    committed.extend(batch.into_transactions());
                }
                Err(reason) => {
                    debug!(lead = %batch.lead_hash(), %reason, "null ledger rejected batch");
                    rejected.extend(batch.hashes());
                }
            }
        }
        state.height += 1;
        Block::new(state.height, committed).with_rejected(rejected)
    }

    /// Deliver `block` to every live subscriber. Returns one acknowledgment
    /// receiver per delivery.
    pub async fn publish(&self, block: Block) -> Vec<oneshot::Receiver<()>> {
        let subscribers = {
            let mut subs = self.subscribers.lock().unwrap();
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        let mut acks = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let (delivery, acked) = BlockDelivery::new(block.clone());
            if subscriber.send(delivery).await.is_ok() {
                acks.push(acked);
            }
        }
        acks
    }

    /// Seal and publish the next block.
    pub async fn produce_block(&self) -> Block {
        let block = self.seal_block();
        self.publish(block.clone()).await;
        block
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for NullLedger {
    async fn query_pending_transactions(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(LedgerError::Unavailable("pending query failed".into()));
        }
        Ok(state
            .pending
            .iter()
            .filter(|tx| accounts.contains(tx.creator()))
            .cloned()
            .collect())
    }

    async fn subscribe_blocks(&self) -> Result<BlockSubscription, LedgerError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.subscribers.lock().unwrap().push(tx);
        Ok(BlockSubscription::new(rx))
    }

    async fn submit_batch(&self, batch: &TransactionBatch) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submissions {
            return Err(LedgerError::Submission("submission failed".into()));
        }
        let hashes = batch.hashes();
        state.pending.retain(|tx| !hashes.contains(&tx.hash()));
        state.submissions.push(batch.clone());
        state.queued.push(batch.clone());
        Ok(())
    }

    async fn account_quorum(&self, account: &AccountId) -> Result<u32, LedgerError> {
        self.state
            .lock()
            .unwrap()
            .world
            .accounts
            .get(account)
            .map(|a| a.quorum)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn account_asset_balance(
        &self,
        account: &AccountId,
        asset_id: &str,
    ) -> Result<Amount, LedgerError> {
        Ok(self.balance(account, asset_id))
    }

    async fn get_account_detail(
        &self,
        account: &AccountId,
        writer: Option<&AccountId>,
        key: &str,
    ) -> Result<Option<String>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .world
            .details
            .iter()
            .find(|((acc, w, k), _)| {
                acc == account && k == key && writer.map_or(true, |wanted| w == wanted)
            })
            .map(|(_, value)| value.clone()))
    }
}
