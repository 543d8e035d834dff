//! Fundamental types for the BRVS validator.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! account identities, transaction hashes, keys and signatures, asset amounts and the
//! verdicts the pipeline assigns to transactions.

pub mod account;
pub mod amount;
pub mod error;
pub mod hash;
pub mod keys;
pub mod verdict;

pub use account::AccountId;
pub use amount::Amount;
pub use error::BrvsError;
pub use hash::TxHash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use verdict::Verdict;
