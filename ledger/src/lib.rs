//! The ledger as BRVS sees it.
//!
//! The wire client is an external collaborator that owns its own retry and
//! backoff. Everything the pipeline needs from it is expressed by
//! [`LedgerGateway`]; committed blocks arrive through a [`BlockSubscription`]
//! and must be acknowledged explicitly once processed.

pub mod error;
pub mod gateway;
pub mod subscription;

pub use error::LedgerError;
pub use gateway::LedgerGateway;
pub use subscription::{BlockDelivery, BlockSubscription};
