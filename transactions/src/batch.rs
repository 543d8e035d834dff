//! Atomic transaction batches and regrouping of raw pending transactions.

use std::collections::{BTreeSet, HashSet};

use brvs_types::{AccountId, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::TransactionError;
use crate::transaction::{BatchMeta, BatchType, Transaction};

/// An ordered, non-empty group of transactions that commit together.
///
/// A single-transaction submission is a batch of one. Identity is the ordered
/// sequence of member hashes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBatch {
    transactions: Vec<Transaction>,
}

impl TransactionBatch {
    pub fn new(transactions: Vec<Transaction>) -> Result<Self, TransactionError> {
        if transactions.is_empty() {
            return Err(TransactionError::EmptyBatch);
        }
        Ok(Self { transactions })
    }

    pub fn single(tx: Transaction) -> Self {
        Self {
            transactions: vec![tx],
        }
    }

    /// Build an atomic batch: stamps every member with batch metadata listing
    /// all members' reduced hashes.
    pub fn atomic(transactions: Vec<Transaction>) -> Result<Self, TransactionError> {
        if transactions.is_empty() {
            return Err(TransactionError::EmptyBatch);
        }
        let meta = BatchMeta {
            batch_type: BatchType::Atomic,
            reduced_hashes: transactions.iter().map(Transaction::reduced_hash).collect(),
        };
        let transactions = transactions
            .into_iter()
            .map(|tx| tx.with_batch_meta(meta.clone()))
            .collect();
        Ok(Self { transactions })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Member hashes in batch order.
    pub fn hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Hash of the first member. Admission locks are keyed by it.
    pub fn lead_hash(&self) -> TxHash {
        self.transactions
            .first()
            .map(Transaction::hash)
            .unwrap_or(TxHash::ZERO)
    }

    /// Every account that created a member transaction.
    pub fn creators(&self) -> BTreeSet<AccountId> {
        self.transactions
            .iter()
            .map(|tx| tx.creator_account_id.clone())
            .collect()
    }

    /// Creators of members that carry a transfer command.
    pub fn transfer_creators(&self) -> BTreeSet<AccountId> {
        self.transactions
            .iter()
            .filter(|tx| tx.has_transfer())
            .map(|tx| tx.creator_account_id.clone())
            .collect()
    }

    /// Check that member reduced hashes match the announced batch metadata.
    pub fn verify_meta(&self) -> Result<(), TransactionError> {
        let Some(meta) = self.transactions.first().and_then(|tx| tx.batch_meta.as_ref()) else {
            return Ok(());
        };
        for (index, tx) in self.transactions.iter().enumerate() {
            if meta.reduced_hashes.get(index) != Some(&tx.reduced_hash()) {
                return Err(TransactionError::BatchMismatch {
                    tx_hash: tx.hash().to_string(),
                    index,
                });
            }
        }
        Ok(())
    }
}

/// Regroup raw pending transactions into batches.
///
/// Duplicates (the same hash reported for several accounts) are dropped. A
/// transaction without batch metadata is a singleton. Otherwise its batch is
/// assembled from the transactions carrying the same metadata, each placed at
/// the position of its reduced hash, wherever they appear in the input.
/// Batches are returned in order of their first visible member.
///
/// A batch with any member missing is not returned; its visible members come
/// back separately as held back, so they are never grouped with unrelated
/// transactions.
pub fn regroup(transactions: Vec<Transaction>) -> (Vec<TransactionBatch>, Vec<Transaction>) {
    let mut seen = HashSet::new();
    let mut slots: Vec<Option<Transaction>> = transactions
        .into_iter()
        .filter(|tx| seen.insert(tx.hash()))
        .map(Some)
        .collect();

    let mut batches = Vec::new();
    let mut held_back = Vec::new();
    for start in 0..slots.len() {
        let Some(first) = slots[start].take() else {
            continue;
        };
        let Some(meta) = first
            .batch_meta
            .clone()
            .filter(|meta| !meta.reduced_hashes.is_empty())
        else {
            batches.push(TransactionBatch::single(first));
            continue;
        };

        let mut members = Vec::with_capacity(first.batch_size_hint());
        let mut first = Some(first);
        let mut missing = 0;
        for reduced in &meta.reduced_hashes {
            if first.as_ref().is_some_and(|tx| tx.reduced_hash() == *reduced) {
                members.extend(first.take());
                continue;
            }
            let found = slots[start + 1..]
                .iter_mut()
                .find(|slot| {
                    slot.as_ref().is_some_and(|tx| {
                        tx.batch_meta.as_ref() == Some(&meta) && tx.reduced_hash() == *reduced
                    })
                })
                .and_then(Option::take);
            match found {
                Some(tx) => members.push(tx),
                None => missing += 1,
            }
        }

        // `first` is still set when its own reduced hash is not listed.
        if missing > 0 || first.is_some() {
            held_back.extend(first);
            held_back.extend(members);
            continue;
        }
        batches.push(TransactionBatch {
            transactions: members,
        });
    }
    (batches, held_back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use brvs_types::Amount;

    fn tx(creator: &str, time: u64, transfer: bool) -> Transaction {
        let account = AccountId::new(creator);
        let command = if transfer {
            Command::TransferAsset {
                src_account_id: account.clone(),
                dest_account_id: AccountId::new("sink@d"),
                asset_id: "x#d".into(),
                description: String::new(),
                amount: Amount::from_units(10),
            }
        } else {
            Command::SetAccountDetail {
                account_id: account.clone(),
                key: "k".into(),
                value: "v".into(),
            }
        };
        Transaction::new(account, time, 1, vec![command])
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            TransactionBatch::new(vec![]),
            Err(TransactionError::EmptyBatch)
        ));
    }

    #[test]
    fn transfer_creators_subset_of_creators() {
        let batch = TransactionBatch::atomic(vec![
            tx("alice@d", 1, true),
            tx("bob@d", 2, false),
        ])
        .unwrap();
        assert_eq!(batch.creators().len(), 2);
        let locking: Vec<_> = batch.transfer_creators().into_iter().collect();
        assert_eq!(locking, vec![AccountId::new("alice@d")]);
        assert!(batch.verify_meta().is_ok());
        assert_eq!(batch.lead_hash(), batch.hashes()[0]);
    }

    #[test]
    fn regroup_collects_announced_members() {
        let atomic = TransactionBatch::atomic(vec![
            tx("alice@d", 1, true),
            tx("alice@d", 2, true),
            tx("bob@d", 3, false),
        ])
        .unwrap();
        let mut raw = vec![tx("carol@d", 9, true)];
        raw.extend(atomic.clone().into_transactions());
        raw.push(tx("dave@d", 10, false));

        let (batches, incomplete) = regroup(raw);
        assert!(incomplete.is_empty());
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[1], atomic);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn regroup_drops_duplicates() {
        let single = tx("alice@d", 1, true);
        let (batches, _) = regroup(vec![single.clone(), single.clone()]);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn regroup_reports_incomplete_tail() {
        let atomic =
            TransactionBatch::atomic(vec![tx("alice@d", 1, true), tx("alice@d", 2, true)])
                .unwrap();
        let first = atomic.transactions()[0].clone();
        let (batches, incomplete) = regroup(vec![tx("bob@d", 5, false), first]);
        assert_eq!(batches.len(), 1);
        assert_eq!(incomplete.len(), 1);
    }

    #[test]
    fn partial_batch_is_not_padded_with_unrelated_transactions() {
        let atomic =
            TransactionBatch::atomic(vec![tx("alice@d", 1, true), tx("bob@d", 2, true)]).unwrap();
        let lead = atomic.transactions()[0].clone();
        let unrelated = tx("alice@d", 9, false);

        let (batches, held_back) = regroup(vec![lead.clone(), unrelated.clone()]);
        assert_eq!(batches, vec![TransactionBatch::single(unrelated)]);
        assert_eq!(held_back, vec![lead]);
    }

    #[test]
    fn interleaved_members_are_collected_in_batch_order() {
        let atomic = TransactionBatch::atomic(vec![
            tx("alice@d", 1, true),
            tx("bob@d", 2, true),
            tx("carol@d", 3, false),
        ])
        .unwrap();
        let members = atomic.transactions();
        let other = tx("dave@d", 4, true);
        let raw = vec![
            members[1].clone(),
            other.clone(),
            members[2].clone(),
            members[0].clone(),
        ];

        let (batches, held_back) = regroup(raw);
        assert!(held_back.is_empty());
        assert_eq!(batches, vec![atomic.clone(), TransactionBatch::single(other)]);
        assert!(batches[0].verify_meta().is_ok());
    }

    #[test]
    fn member_of_a_different_batch_is_not_borrowed() {
        let first =
            TransactionBatch::atomic(vec![tx("alice@d", 1, true), tx("bob@d", 2, true)]).unwrap();
        // Same payloads, but announced by a batch with an extra member.
        let second = TransactionBatch::atomic(vec![
            tx("alice@d", 1, true),
            tx("bob@d", 2, true),
            tx("carol@d", 3, true),
        ])
        .unwrap();
        let raw = vec![
            first.transactions()[0].clone(),
            second.transactions()[1].clone(),
        ];

        let (batches, held_back) = regroup(raw);
        assert!(batches.is_empty());
        assert_eq!(held_back.len(), 2);
    }

    #[test]
    fn verify_meta_detects_foreign_member() {
        let atomic =
            TransactionBatch::atomic(vec![tx("alice@d", 1, true), tx("alice@d", 2, true)])
                .unwrap();
        let mut members = atomic.into_transactions();
        members[1] = tx("mallory@d", 3, true);
        let forged = TransactionBatch::new(members).unwrap();
        assert!(matches!(
            forged.verify_meta(),
            Err(TransactionError::BatchMismatch { index: 1, .. })
        ));
    }
}
