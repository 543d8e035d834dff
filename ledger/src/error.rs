use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("block stream closed")]
    StreamClosed,

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}
