//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing the fundamental BRVS types.
#[derive(Debug, Error)]
pub enum BrvsError {
    #[error("invalid account id: {0} (expected name@domain)")]
    InvalidAccountId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}
