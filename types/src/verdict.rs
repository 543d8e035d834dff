//! Pipeline verdicts for transaction hashes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome classification the pipeline assigns to a transaction hash.
///
/// A hash starts `Pending` when it first enters the pipeline and moves to exactly
/// one terminal state. Terminal verdicts are never overwritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    Pending,
    Validated,
    Rejected(String),
    Failed(String),
}

impl Verdict {
    /// `validated`, `rejected` and `failed` are terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether this verdict should release admission locks via the rejected/failed stream.
    pub fn is_rejected_or_failed(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Failed(_))
    }

    /// Human-readable reason for non-validated terminal outcomes.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected(reason) | Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.label(), reason),
            None => write!(f, "{}", self.label()),
        }
    }
}
