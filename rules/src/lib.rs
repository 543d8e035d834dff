//! Business rules applied to pending batches before BRVS co-signs them.
//!
//! A [`Rule`] is a named predicate over a single transaction. The
//! [`RuleEngine`] holds the currently installed set and folds every rule over
//! every transaction of a batch into one [`brvs_types::Verdict`]. The set is
//! mutated at runtime by the rule monitor in `brvs-node`, either from the
//! [`builtin`] catalogue or by compiling a declarative [`dsl::RuleBody`]
//! fetched from the chain.

pub mod builtin;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod rule;

pub use builtin::{BuiltinRule, MinimumBalanceRule, RestrictedKeysRule, VolumeRule};
pub use dsl::{compile, Condition, DeclarativeRule, RuleBody};
pub use engine::RuleEngine;
pub use error::RuleError;
pub use rule::{Rule, RuleContext, RuleOutcome};
