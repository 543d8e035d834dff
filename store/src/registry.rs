//! Registered-account storage trait.

use brvs_types::AccountId;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// An account that has enrolled with BRVS as a co-signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAccount {
    pub account_id: AccountId,
    /// Number of user keys registered for the account, when known. Drives the
    /// quorum threshold applied by the pending-batch filter.
    pub user_key_count: Option<u32>,
}

/// Set of accounts whose pending transactions BRVS watches.
pub trait AccountRegistry: Send + Sync {
    fn registered_accounts(&self) -> Result<Vec<AccountId>, StoreError>;

    fn is_registered(&self, account: &AccountId) -> Result<bool, StoreError>;

    fn user_key_count(&self, account: &AccountId) -> Result<Option<u32>, StoreError>;

    fn register(&self, account: RegisteredAccount) -> Result<(), StoreError>;
}
