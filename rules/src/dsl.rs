//! Declarative rule language for rules governed from the chain.
//!
//! A rule body is a JSON document stored as an account detail in the rule
//! repository:
//!
//! ```json
//! {
//!   "description": "cap transfers of xor#sora",
//!   "reject_if": { "all": [
//!     { "command": "transfer_asset" },
//!     { "asset_is": "xor#sora" },
//!     { "amount_gt": "150" }
//!   ]},
//!   "reason": "transfer of {amount} {asset} exceeds the limit"
//! }
//! ```
//!
//! `reject_if` is evaluated once per command of a transaction (once against
//! no command when the transaction has none); the transaction is rejected
//! when any evaluation holds. Bodies are data only. Nothing from the chain is
//! ever executed as code.

use async_trait::async_trait;
use brvs_transactions::{Command, Transaction};
use brvs_types::{AccountId, Amount};
use serde::{Deserialize, Serialize};

use crate::{Rule, RuleContext, RuleError, RuleOutcome};

const PLACEHOLDERS: [&str; 4] = ["amount", "asset", "creator", "destination"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBody {
    #[serde(default)]
    pub description: String,
    pub reject_if: Condition,
    pub reason: String,
}

/// A predicate over a transaction and one of its commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    /// The command has this snake_case name, e.g. `transfer_asset`.
    Command(String),
    CreatorIs(AccountId),
    AssetIs(String),
    AmountGt(Amount),
    AmountGte(Amount),
    DestinationIs(AccountId),
    /// The command is a `set_account_detail` writing this key.
    DetailKeyIs(String),
    CommandsGt(usize),
}

impl Condition {
    fn holds(&self, tx: &Transaction, command: Option<&Command>) -> bool {
        match self {
            Self::All(all) => all.iter().all(|c| c.holds(tx, command)),
            Self::Any(any) => any.iter().any(|c| c.holds(tx, command)),
            Self::Not(inner) => !inner.holds(tx, command),
            Self::Command(name) => command.is_some_and(|c| c.name() == name),
            Self::CreatorIs(account) => tx.creator() == account,
            Self::AssetIs(asset) => command.and_then(Command::asset_id) == Some(asset.as_str()),
            Self::AmountGt(limit) => command
                .and_then(Command::amount)
                .is_some_and(|amount| amount > *limit),
            Self::AmountGte(limit) => command
                .and_then(Command::amount)
                .is_some_and(|amount| amount >= *limit),
            Self::DestinationIs(account) => matches!(
                command,
                Some(Command::TransferAsset { dest_account_id, .. }) if dest_account_id == account
            ),
            Self::DetailKeyIs(wanted) => matches!(
                command,
                Some(Command::SetAccountDetail { key, .. }) if key == wanted
            ),
            Self::CommandsGt(n) => tx.commands.len() > *n,
        }
    }
}

/// A compiled [`RuleBody`].
#[derive(Clone, Debug)]
pub struct DeclarativeRule {
    name: String,
    body: RuleBody,
}

impl DeclarativeRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &RuleBody {
        &self.body
    }

    fn render_reason(&self, tx: &Transaction, command: Option<&Command>) -> Result<String, RuleError> {
        let mut out = String::with_capacity(self.body.reason.len());
        let mut rest = self.body.reason.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let field = &after[..end];
            let value = match field {
                "amount" => command.and_then(Command::amount).map(|a| a.to_string()),
                "asset" => command.and_then(Command::asset_id).map(str::to_string),
                "creator" => Some(tx.creator().to_string()),
                "destination" => match command {
                    Some(Command::TransferAsset { dest_account_id, .. }) => {
                        Some(dest_account_id.to_string())
                    }
                    _ => None,
                },
                _ => None,
            };
            let value = value.ok_or_else(|| RuleError::Evaluation {
                rule: self.name.clone(),
                reason: format!("reason field {{{field}}} is not available on this command"),
            })?;
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Parse and check a rule body.
pub fn compile(name: &str, source: &str) -> Result<DeclarativeRule, RuleError> {
    let compile_error = |reason: String| RuleError::Compile {
        name: name.to_string(),
        reason,
    };
    let body: RuleBody = serde_json::from_str(source).map_err(|e| compile_error(e.to_string()))?;
    if body.reason.trim().is_empty() {
        return Err(compile_error("reason must not be empty".into()));
    }
    for field in placeholders(&body.reason) {
        if !PLACEHOLDERS.contains(&field) {
            return Err(compile_error(format!("unknown reason field {{{field}}}")));
        }
    }
    Ok(DeclarativeRule {
        name: name.to_string(),
        body,
    })
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    template
        .split('{')
        .skip(1)
        .filter_map(|part| part.split_once('}').map(|(field, _)| field))
}

#[async_trait]
impl Rule for DeclarativeRule {
    async fn check(&self, tx: &Transaction, _ctx: &RuleContext) -> Result<RuleOutcome, RuleError> {
        if tx.commands.is_empty() {
            if self.body.reject_if.holds(tx, None) {
                return Ok(RuleOutcome::Reject(self.render_reason(tx, None)?));
            }
            return Ok(RuleOutcome::Pass);
        }
        for command in &tx.commands {
            if self.body.reject_if.holds(tx, Some(command)) {
                return Ok(RuleOutcome::Reject(self.render_reason(tx, Some(command))?));
            }
        }
        Ok(RuleOutcome::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brvs_nullables::{NullAccountRegistry, NullLedger};
    use brvs_types::PublicKey;
    use std::sync::Arc;

    const VOLUME: &str = r#"{
        "description": "cap xor transfers",
        "reject_if": {"all": [
            {"command": "transfer_asset"},
            {"asset_is": "xor#sora"},
            {"amount_gt": "150"}
        ]},
        "reason": "transfer of {amount} {asset} to {destination} exceeds the limit"
    }"#;

    fn ctx() -> RuleContext {
        RuleContext {
            ledger: Arc::new(NullLedger::new()),
            registry: Arc::new(NullAccountRegistry::new()),
            brvs_key: PublicKey([9u8; 32]),
        }
    }

    fn transfer(asset: &str, amount: &str) -> Command {
        Command::TransferAsset {
            src_account_id: AccountId::new("sender@d"),
            dest_account_id: AccountId::new("receiver@d"),
            asset_id: asset.into(),
            description: String::new(),
            amount: Amount::parse(amount).unwrap(),
        }
    }

    fn tx(commands: Vec<Command>) -> Transaction {
        Transaction::new(AccountId::new("sender@d"), 1, 1, commands)
    }

    #[tokio::test]
    async fn volume_body_rejects_large_transfer() {
        let rule = compile("volume", VOLUME).unwrap();
        let outcome = rule
            .check(&tx(vec![transfer("xor#sora", "200")]), &ctx())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RuleOutcome::Reject("transfer of 200 xor#sora to receiver@d exceeds the limit".into())
        );
    }

    #[tokio::test]
    async fn conditions_bind_to_a_single_command() {
        let rule = compile("volume", VOLUME).unwrap();
        // Large amount is on another asset; the xor transfer is small.
        let mixed = tx(vec![transfer("val#sora", "500"), transfer("xor#sora", "10")]);
        assert_eq!(rule.check(&mixed, &ctx()).await.unwrap(), RuleOutcome::Pass);
        assert_eq!(
            rule.check(&tx(vec![transfer("xor#sora", "150")]), &ctx())
                .await
                .unwrap(),
            RuleOutcome::Pass
        );
    }

    #[tokio::test]
    async fn not_and_creator() {
        let source = r#"{
            "reject_if": {"all": [
                {"detail_key_is": "email"},
                {"not": {"creator_is": "admin@d"}}
            ]},
            "reason": "{creator} may not set email"
        }"#;
        let rule = compile("email", source).unwrap();
        let set_email = Command::SetAccountDetail {
            account_id: AccountId::new("sender@d"),
            key: "email".into(),
            value: "x".into(),
        };
        assert_eq!(
            rule.check(&tx(vec![set_email]), &ctx()).await.unwrap(),
            RuleOutcome::Reject("sender@d may not set email".into())
        );
    }

    #[tokio::test]
    async fn missing_reason_field_is_an_evaluation_error() {
        let source = r#"{"reject_if": {"commands_gt": 0}, "reason": "moved {amount}"}"#;
        let rule = compile("odd", source).unwrap();
        let detail = Command::SetAccountQuorum {
            account_id: AccountId::new("sender@d"),
            quorum: 3,
        };
        assert!(matches!(
            rule.check(&tx(vec![detail]), &ctx()).await,
            Err(RuleError::Evaluation { .. })
        ));
    }

    #[test]
    fn malformed_bodies_do_not_compile() {
        for source in [
            "not json",
            r#"{"reject_if": {"amount_gt": "abc"}, "reason": "x"}"#,
            r#"{"reject_if": {"launch_missiles": true}, "reason": "x"}"#,
            r#"{"reject_if": {"commands_gt": 1}, "reason": "  "}"#,
            r#"{"reject_if": {"commands_gt": 1}, "reason": "bad {field}"}"#,
            r#"{"reject_if": {"commands_gt": 1}, "reason": "x", "extra": 1}"#,
        ] {
            assert!(
                matches!(compile("r", source), Err(RuleError::Compile { .. })),
                "{source} should not compile"
            );
        }
    }
}
