//! Committed ledger blocks.

use brvs_types::TxHash;
use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// A committed block as delivered by the ledger's block stream.
///
/// Besides the committed transactions, a block lists the hashes of transactions
/// the ledger rejected while building it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub rejected_transaction_hashes: Vec<TxHash>,
}

impl Block {
    pub fn new(height: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            transactions,
            rejected_transaction_hashes: Vec::new(),
        }
    }

    pub fn with_rejected(mut self, hashes: Vec<TxHash>) -> Self {
        self.rejected_transaction_hashes = hashes;
        self
    }

    pub fn committed_hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Every hash this block reports as terminal, committed first.
    pub fn observed_hashes(&self) -> Vec<TxHash> {
        let mut hashes = self.committed_hashes();
        hashes.extend(self.rejected_transaction_hashes.iter().copied());
        hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use brvs_types::AccountId;

    #[test]
    fn observed_hashes_include_rejections() {
        let tx = Transaction::new(
            AccountId::new("alice@d"),
            1,
            1,
            vec![Command::SetAccountQuorum {
                account_id: AccountId::new("alice@d"),
                quorum: 2,
            }],
        );
        let rejected = TxHash::new([9u8; 32]);
        let block = Block::new(7, vec![tx.clone()]).with_rejected(vec![rejected]);
        assert_eq!(block.observed_hashes(), vec![tx.hash(), rejected]);
    }
}
