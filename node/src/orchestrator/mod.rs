//! Loops bridging the ledger and the verdict store into the admission cache.
//!
//! - [`PendingPoller`] polls pending batches, filters them by signature
//!   quorum, marks them pending and offers new ones for admission.
//! - [`BlockReactor`] runs block-reaction plugins on every committed block,
//!   releases the locks of observed hashes, then acknowledges the block.
//! - [`ReleaseListener`] releases locks as hashes are marked rejected or failed,
//!   and on requests sent through [`ReleaseRequests`].
//!
//! Each loop runs in its own task. Errors are returned to the service, which
//! treats them as fatal.

mod poller;
mod reactor;
mod release;

pub use poller::{PendingPoller, PollReport};
pub use reactor::{BlockReactor, LEDGER_REJECTION_REASON};
pub use release::{ReleaseListener, ReleaseRequests};
