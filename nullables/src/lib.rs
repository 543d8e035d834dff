//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the BRVS pipeline talks to (ledger peer, verdict
//! persistence, account registry) sits behind a trait. This crate provides
//! in-memory implementations that:
//! - Behave deterministically
//! - Can be driven and inspected programmatically
//! - Never touch the filesystem or network
//!
//! Usage: hand these to the pipeline in tests and local runs in place of the
//! real backends.

pub mod ledger;
pub mod store;

pub use ledger::NullLedger;
pub use store::{NullAccountRegistry, NullVerdictStore};
