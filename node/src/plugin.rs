//! Block-reaction plugin contract.
//!
//! A plugin sees the full transaction list of every committed block. It first
//! selects and reshapes what it cares about ([`BlockPlugin::filter_and_transform`]),
//! then applies its side effects ([`BlockPlugin::apply`]). The block is
//! acknowledged only after every plugin returned `Ok`, so a restart redelivers
//! it: plugins must tolerate seeing the same block twice.

use async_trait::async_trait;
use brvs_ledger::LedgerError;
use brvs_store::StoreError;
use brvs_transactions::Transaction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin {plugin} failed: {reason}")]
    Failed { plugin: String, reason: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait BlockPlugin: Send + Sync {
    /// What the plugin extracts from a block.
    type Processable: Send;

    fn name(&self) -> &str;

    fn filter_and_transform(&self, transactions: &[Transaction]) -> Self::Processable;

    async fn apply(&self, processable: Self::Processable) -> Result<(), PluginError>;
}

/// Object-safe view of a [`BlockPlugin`], so plugins with different
/// `Processable` types can be held in one list.
#[async_trait]
pub trait BlockReaction: Send + Sync {
    fn plugin_name(&self) -> &str;

    async fn react(&self, transactions: &[Transaction]) -> Result<(), PluginError>;
}

#[async_trait]
impl<P: BlockPlugin> BlockReaction for P {
    fn plugin_name(&self) -> &str {
        self.name()
    }

    async fn react(&self, transactions: &[Transaction]) -> Result<(), PluginError> {
        let processable = self.filter_and_transform(transactions);
        self.apply(processable).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_transactions::Command;
    use brvs_types::{AccountId, Amount};
    use std::sync::{Arc, Mutex};

    /// Sums transfer amounts into one account.
    struct IncomingTotal {
        account: AccountId,
        seen: Mutex<Vec<Amount>>,
    }

    #[async_trait]
    impl BlockPlugin for IncomingTotal {
        type Processable = Vec<Amount>;

        fn name(&self) -> &str {
            "incoming-total"
        }

        fn filter_and_transform(&self, transactions: &[Transaction]) -> Vec<Amount> {
            transactions
                .iter()
                .flat_map(|tx| &tx.commands)
                .filter_map(|command| match command {
                    Command::TransferAsset {
                        dest_account_id,
                        amount,
                        ..
                    } if *dest_account_id == self.account => Some(*amount),
                    _ => None,
                })
                .collect()
        }

        async fn apply(&self, amounts: Vec<Amount>) -> Result<(), PluginError> {
            self.seen.lock().unwrap().extend(amounts);
            Ok(())
        }
    }

    #[tokio::test]
    async fn erased_plugin_filters_then_applies() {
        let plugin = Arc::new(IncomingTotal {
            account: AccountId::new("bob@d"),
            seen: Mutex::new(Vec::new()),
        });
        let reaction: Arc<dyn BlockReaction> = plugin.clone();
        let tx = Transaction::new(
            AccountId::new("alice@d"),
            1,
            1,
            vec![
                Command::TransferAsset {
                    src_account_id: AccountId::new("alice@d"),
                    dest_account_id: AccountId::new("bob@d"),
                    asset_id: "x#d".into(),
                    description: String::new(),
                    amount: Amount::from_units(5),
                },
                Command::TransferAsset {
                    src_account_id: AccountId::new("alice@d"),
                    dest_account_id: AccountId::new("carol@d"),
                    asset_id: "x#d".into(),
                    description: String::new(),
                    amount: Amount::from_units(7),
                },
            ],
        );
        reaction.react(&[tx]).await.unwrap();
        assert_eq!(reaction.plugin_name(), "incoming-total");
        assert_eq!(*plugin.seen.lock().unwrap(), vec![Amount::from_units(5)]);
    }
}
