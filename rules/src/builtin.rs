//! Rules shipped with the validator.

use std::sync::Arc;

use async_trait::async_trait;
use brvs_transactions::{Command, Transaction};
use brvs_types::Amount;
use serde::{Deserialize, Serialize};

use crate::{Rule, RuleContext, RuleError, RuleOutcome};

/// Rejects transfers of one asset above a fixed limit.
#[derive(Clone, Debug)]
pub struct VolumeRule {
    pub asset_id: String,
    pub limit: Amount,
}

#[async_trait]
impl Rule for VolumeRule {
    async fn check(&self, tx: &Transaction, _ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        for command in &tx.commands {
            if let Command::TransferAsset {
                asset_id, amount, ..
            } = command
            {
                if *asset_id == self.asset_id && *amount > self.limit {
                    return Ok(RuleOutcome::Reject(format!(
                        "transfer of {amount} {asset_id} exceeds the limit of {}",
                        self.limit
                    )));
                }
            }
        }
        Ok(RuleOutcome::Pass)
    }
}

/// Protects the co-signing arrangement itself.
///
/// Rejects any transaction that adds or removes BRVS's key on an account, and
/// any quorum change on a registered account.
#[derive(Clone, Debug, Default)]
pub struct RestrictedKeysRule;

#[async_trait]
impl Rule for RestrictedKeysRule {
    async fn check(&self, tx: &Transaction, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        for command in &tx.commands {
            match command {
                Command::AddSignatory {
                    account_id,
                    public_key,
                }
                | Command::RemoveSignatory {
                    account_id,
                    public_key,
                } if *public_key == ctx.brvs_key => {
                    return Ok(RuleOutcome::Reject(format!(
                        "{} may not touch the validator key on {account_id}",
                        command.name()
                    )));
                }
                Command::SetAccountQuorum { account_id, .. }
                    if ctx.registry.is_registered(account_id)? =>
                {
                    return Ok(RuleOutcome::Reject(format!(
                        "quorum of registered account {account_id} is managed by the validator"
                    )));
                }
                _ => {}
            }
        }
        Ok(RuleOutcome::Pass)
    }
}

/// Rejects transfers that would leave the source below a floor balance.
#[derive(Clone, Debug)]
pub struct MinimumBalanceRule {
    pub asset_id: String,
    pub floor: Amount,
}

#[async_trait]
impl Rule for MinimumBalanceRule {
    async fn check(&self, tx: &Transaction, ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        for command in &tx.commands {
            let Command::TransferAsset {
                src_account_id,
                asset_id,
                amount,
                ..
            } = command
            else {
                continue;
            };
            if *asset_id != self.asset_id {
                continue;
            }
            let balance = ctx
                .ledger
                .account_asset_balance(src_account_id, asset_id)
                .await?;
            let remaining = balance.checked_sub(*amount);
            if remaining.map_or(true, |left| left < self.floor) {
                return Ok(RuleOutcome::Reject(format!(
                    "transfer of {amount} {asset_id} would leave {src_account_id} below the minimum of {}",
                    self.floor
                )));
            }
        }
        Ok(RuleOutcome::Pass)
    }
}

/// Configuration entry for a built-in rule, as written in the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuiltinRule {
    Volume { asset_id: String, limit: Amount },
    RestrictedKeys,
    MinimumBalance { asset_id: String, floor: Amount },
}

impl BuiltinRule {
    /// Name the rule is installed under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Volume { .. } => "volume",
            Self::RestrictedKeys => "restricted-keys",
            Self::MinimumBalance { .. } => "minimum-balance",
        }
    }

    pub fn build(&self) -> Arc<dyn Rule> {
        match self {
            Self::Volume { asset_id, limit } => Arc::new(VolumeRule {
                asset_id: asset_id.clone(),
                limit: *limit,
            }),
            Self::RestrictedKeys => Arc::new(RestrictedKeysRule),
            Self::MinimumBalance { asset_id, floor } => Arc::new(MinimumBalanceRule {
                asset_id: asset_id.clone(),
                floor: *floor,
            }),
        }
    }
}
