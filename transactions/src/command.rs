//! Ledger commands carried inside a transaction.

use brvs_types::{AccountId, Amount, PublicKey};
use serde::{Deserialize, Serialize};

/// A single ledger instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Move `amount` of `asset_id` between two accounts. The only balance-affecting
    /// command that participates in admission locking.
    TransferAsset {
        src_account_id: AccountId,
        dest_account_id: AccountId,
        asset_id: String,
        description: String,
        amount: Amount,
    },
    /// Mint into the creator's account.
    AddAssetQuantity { asset_id: String, amount: Amount },
    /// Burn from the creator's account.
    SubtractAssetQuantity { asset_id: String, amount: Amount },
    /// Write a key/value pair into an account's detail storage, attributed to the creator.
    SetAccountDetail {
        account_id: AccountId,
        key: String,
        value: String,
    },
    AddSignatory {
        account_id: AccountId,
        public_key: PublicKey,
    },
    RemoveSignatory {
        account_id: AccountId,
        public_key: PublicKey,
    },
    SetAccountQuorum { account_id: AccountId, quorum: u32 },
    CreateAccount {
        account_name: String,
        domain_id: String,
        public_key: PublicKey,
    },
}

impl Command {
    /// Stable snake_case name, as used by the declarative rule language.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransferAsset { .. } => "transfer_asset",
            Self::AddAssetQuantity { .. } => "add_asset_quantity",
            Self::SubtractAssetQuantity { .. } => "subtract_asset_quantity",
            Self::SetAccountDetail { .. } => "set_account_detail",
            Self::AddSignatory { .. } => "add_signatory",
            Self::RemoveSignatory { .. } => "remove_signatory",
            Self::SetAccountQuorum { .. } => "set_account_quorum",
            Self::CreateAccount { .. } => "create_account",
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::TransferAsset { .. })
    }

    /// Asset referenced by the command, if any.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            Self::TransferAsset { asset_id, .. }
            | Self::AddAssetQuantity { asset_id, .. }
            | Self::SubtractAssetQuantity { asset_id, .. } => Some(asset_id),
            _ => None,
        }
    }

    /// Amount moved by the command, if any.
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Self::TransferAsset { amount, .. }
            | Self::AddAssetQuantity { amount, .. }
            | Self::SubtractAssetQuantity { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// Account the command acts upon, if it names one.
    pub fn target_account(&self) -> Option<&AccountId> {
        match self {
            Self::TransferAsset {
                dest_account_id, ..
            } => Some(dest_account_id),
            Self::SetAccountDetail { account_id, .. }
            | Self::AddSignatory { account_id, .. }
            | Self::RemoveSignatory { account_id, .. }
            | Self::SetAccountQuorum { account_id, .. } => Some(account_id),
            _ => None,
        }
    }

    /// Append a canonical, length-prefixed encoding of the command to `out`.
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        put_str(out, self.name());
        match self {
            Self::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                description,
                amount,
            } => {
                put_str(out, src_account_id.as_str());
                put_str(out, dest_account_id.as_str());
                put_str(out, asset_id);
                put_str(out, description);
                put_str(out, &amount.to_string());
            }
            Self::AddAssetQuantity { asset_id, amount }
            | Self::SubtractAssetQuantity { asset_id, amount } => {
                put_str(out, asset_id);
                put_str(out, &amount.to_string());
            }
            Self::SetAccountDetail {
                account_id,
                key,
                value,
            } => {
                put_str(out, account_id.as_str());
                put_str(out, key);
                put_str(out, value);
            }
            Self::AddSignatory {
                account_id,
                public_key,
            }
            | Self::RemoveSignatory {
                account_id,
                public_key,
            } => {
                put_str(out, account_id.as_str());
                out.extend_from_slice(public_key.as_bytes());
            }
            Self::SetAccountQuorum { account_id, quorum } => {
                put_str(out, account_id.as_str());
                out.extend_from_slice(&quorum.to_le_bytes());
            }
            Self::CreateAccount {
                account_name,
                domain_id,
                public_key,
            } => {
                put_str(out, account_name);
                put_str(out, domain_id);
                out.extend_from_slice(public_key.as_bytes());
            }
        }
    }
}

pub(crate) fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}
