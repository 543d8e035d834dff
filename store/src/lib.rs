//! Abstract storage traits for the BRVS validator.
//!
//! Persistence backends for verdicts and registered accounts live outside this
//! workspace. The pipeline depends only on these traits; `brvs-nullables`
//! provides in-memory implementations for tests and local runs.

pub mod error;
pub mod registry;
pub mod verdict;

pub use error::StoreError;
pub use registry::{AccountRegistry, RegisteredAccount};
pub use verdict::{VerdictRecord, VerdictStore};
