//! The rule contract.

use std::sync::Arc;

use async_trait::async_trait;
use brvs_ledger::LedgerGateway;
use brvs_store::AccountRegistry;
use brvs_transactions::Transaction;
use brvs_types::PublicKey;

use crate::RuleError;

/// Result of applying one rule to one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Reject(String),
}

/// Read-only state rules may consult while evaluating.
#[derive(Clone)]
pub struct RuleContext {
    pub ledger: Arc<dyn LedgerGateway>,
    pub registry: Arc<dyn AccountRegistry>,
    /// BRVS's own signing key.
    pub brvs_key: PublicKey,
}

/// A named business predicate over a transaction.
///
/// Rules hold no per-batch state. They may read the ledger or the registry
/// through the context; such reads can fail, which is reported as an error
/// rather than a rejection.
#[async_trait]
pub trait Rule: Send + Sync {
    async fn check(&self, tx: &Transaction, ctx: &RuleContext)
        -> Result<RuleOutcome, RuleError>;
}
