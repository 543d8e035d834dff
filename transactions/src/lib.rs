//! The ledger transaction model as BRVS observes it.
//!
//! - **Command**: one ledger instruction (transfer, account detail, signatory change, ...)
//! - **Transaction**: a creator-signed list of commands with a signature quorum
//! - **TransactionBatch**: one or more transactions that commit atomically
//! - **Block**: the committed transactions plus hashes the ledger rejected

pub mod batch;
pub mod block;
pub mod command;
pub mod error;
pub mod transaction;

pub use batch::{regroup, TransactionBatch};
pub use block::Block;
pub use command::Command;
pub use error::TransactionError;
pub use transaction::{BatchMeta, BatchType, Transaction, TxSignature};
