use brvs_ledger::LedgerError;
use brvs_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule {name} does not compile: {reason}")]
    Compile { name: String, reason: String },

    #[error("rule {rule} could not be evaluated: {reason}")]
    Evaluation { rule: String, reason: String },

    #[error("ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store read failed: {0}")]
    Store(#[from] StoreError),
}
