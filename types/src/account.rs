//! Account identity in `name@domain` form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BrvsError;

/// A ledger account identifier, always `name@domain`.
///
/// The account is the unit of admission ordering: at most one balance-affecting
/// batch per account is in flight through validation at any time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// The separator between account name and domain.
    pub const SEPARATOR: char = '@';

    /// Parse an account identifier, rejecting anything that is not `name@domain`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, BrvsError> {
        let s = raw.into();
        let mut parts = s.split(Self::SEPARATOR);
        let name = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        if name.is_empty() || domain.is_empty() || parts.next().is_some() {
            return Err(BrvsError::InvalidAccountId(s));
        }
        Ok(Self(s))
    }

    /// Create an account identifier from a trusted literal.
    ///
    /// # Panics
    /// Panics if the string is not of the form `name@domain`.
    pub fn new(raw: impl Into<String>) -> Self {
        let s = raw.into();
        match Self::parse(s.clone()) {
            Ok(id) => id,
            Err(_) => panic!("account id must be name@domain, got {s:?}"),
        }
    }

    /// Return the raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@`.
    pub fn name(&self) -> &str {
        self.0
            .split_once(Self::SEPARATOR)
            .map(|(name, _)| name)
            .unwrap_or(&self.0)
    }

    /// The part after the `@`.
    pub fn domain(&self) -> &str {
        self.0
            .split_once(Self::SEPARATOR)
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = BrvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = BrvsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}
