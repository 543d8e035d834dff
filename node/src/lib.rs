//! BRVS: a validator and co-signer sidecar for a permissioned ledger.
//!
//! BRVS holds one signature of every registered account's quorum. It:
//! - Polls pending batches of registered accounts that already carry enough
//!   user signatures
//! - Admits at most one batch per account into validation at a time
//! - Evaluates the installed business rules against every transaction
//! - Co-signs passing batches, and poisons the rest so the ledger rejects them
//! - Follows committed blocks to release accounts and run block plugins
//! - Lets an on-chain setter account switch rules on and off

pub mod admission;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod plugin;
pub mod service;
pub mod shutdown;
pub mod signer;
pub mod status;
pub mod tracing_spans;
pub mod worker;

pub use admission::{AdmissionCache, AdmissionError, Offer};
pub use config::BrvsConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::BrvsMetrics;
pub use monitor::{GovernanceAccounts, RuleChange, RuleMonitor, RuleUpdate};
pub use orchestrator::{
    BlockReactor, PendingPoller, PollReport, ReleaseListener, ReleaseRequests,
    LEDGER_REJECTION_REASON,
};
pub use plugin::{BlockPlugin, BlockReaction, PluginError};
pub use service::{Brvs, Collaborators};
pub use shutdown::ShutdownController;
pub use signer::{SignOutcome, Signer};
pub use status::StatusView;
pub use worker::ValidationWorker;
