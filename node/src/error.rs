use thiserror::Error;

use crate::admission::AdmissionError;
use crate::plugin::PluginError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] brvs_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] brvs_store::StoreError),

    #[error("rule error: {0}")]
    Rule(#[from] brvs_rules::RuleError),

    #[error("admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("block plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("config error: {0}")]
    Config(String),

    #[error("signing key error: {0}")]
    Key(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("service already started")]
    AlreadyStarted,

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
