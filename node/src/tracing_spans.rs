//! Pre-built [`tracing::Span`] constructors for the pipeline's hot paths.
//!
//! Consistent span names and fields make admission, validation and block
//! handling easy to filter and correlate across log lines.

use tracing::{info_span, Span};

/// One pass of the pending-batch poll.
pub fn pending_poll_span(accounts: usize) -> Span {
    info_span!("pending_poll", accounts = accounts)
}

/// Offering a batch to the admission cache.
pub fn admission_offer_span(lead: &str, size: usize) -> Span {
    info_span!("admission_offer", lead = %lead, size = size)
}

/// Rule validation and signing of a single admitted batch.
pub fn batch_validate_span(lead: &str) -> Span {
    info_span!("batch_validate", lead = %lead)
}

/// Reaction to one committed block.
pub fn block_react_span(height: u64) -> Span {
    info_span!("block_react", height = height)
}

/// A chain-governed rule flag change.
pub fn rule_update_span(rule: &str, enabled: bool) -> Span {
    info_span!("rule_update", rule = %rule, enabled = enabled)
}
