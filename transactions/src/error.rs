use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("a batch must contain at least one transaction")]
    EmptyBatch,

    #[error("batch meta announces {expected} transactions but only {available} are pending")]
    IncompleteBatch { expected: usize, available: usize },

    #[error("transaction {tx_hash} does not match reduced hash #{index} of its batch")]
    BatchMismatch { tx_hash: String, index: usize },
}
