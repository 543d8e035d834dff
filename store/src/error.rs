use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("invalid verdict transition: {0}")]
    InvalidTransition(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
