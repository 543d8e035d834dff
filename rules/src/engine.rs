//! The installed rule set and batch validation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use brvs_transactions::TransactionBatch;
use brvs_types::Verdict;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Rule, RuleContext, RuleError, RuleOutcome};

type RuleSet = BTreeMap<String, Arc<dyn Rule>>;

/// Named rules applied to every batch.
///
/// The set is copy-on-write: `validate` evaluates against the snapshot it read
/// on entry, so a concurrent `put_rule` or `remove_rule` only affects later
/// calls and no reader ever sees a half-updated set. Rules run in name order.
pub struct RuleEngine {
    rules: RwLock<Arc<RuleSet>>,
    context: RuleContext,
}

impl RuleEngine {
    pub fn new(context: RuleContext) -> Self {
        Self {
            rules: RwLock::new(Arc::new(BTreeMap::new())),
            context,
        }
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    /// Evaluate every installed rule against every transaction of `batch`.
    ///
    /// The first rejection decides the verdict. A rule that cannot be
    /// evaluated aborts validation with an error naming the rule.
    pub async fn validate(&self, batch: &TransactionBatch) -> Result<Verdict, RuleError> {
        let snapshot = self.rules.read().await.clone();
        for (name, rule) in snapshot.iter() {
            for tx in batch.transactions() {
                let outcome = rule.check(tx, &self.context).await.map_err(|e| match e {
                    RuleError::Evaluation { .. } => e,
                    other => RuleError::Evaluation {
                        rule: name.clone(),
                        reason: other.to_string(),
                    },
                })?;
                if let RuleOutcome::Reject(reason) = outcome {
                    debug!(rule = %name, tx = %tx.hash(), %reason, "rule rejected transaction");
                    return Ok(Verdict::Rejected(reason));
                }
            }
        }
        Ok(Verdict::Validated)
    }

    /// Install `rule` under `name`, returning the rule it replaced.
    pub async fn put_rule(&self, name: &str, rule: Arc<dyn Rule>) -> Option<Arc<dyn Rule>> {
        let mut guard = self.rules.write().await;
        Arc::make_mut(&mut *guard).insert(name.to_string(), rule)
    }

    pub async fn remove_rule(&self, name: &str) -> Option<Arc<dyn Rule>> {
        let mut guard = self.rules.write().await;
        if !guard.contains_key(name) {
            return None;
        }
        Arc::make_mut(&mut *guard).remove(name)
    }

    pub async fn contains_rule(&self, name: &str) -> bool {
        self.rules.read().await.contains_key(name)
    }

    pub async fn rule_names(&self) -> BTreeSet<String> {
        self.rules.read().await.keys().cloned().collect()
    }
}
