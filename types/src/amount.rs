//! Decimal asset amounts.
//!
//! The ledger carries asset quantities as decimal strings (`"150"`, `"0.25"`).
//! They are held here as a fixed-point integer plus a scale so that comparisons
//! and balance arithmetic never go through floating point.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::BrvsError;

/// Largest number of fractional digits accepted.
pub const MAX_SCALE: u8 = 18;

/// A non-negative decimal amount: `units / 10^scale`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount {
    units: u128,
    scale: u8,
}

impl Amount {
    pub const ZERO: Self = Self { units: 0, scale: 0 };

    /// A whole-number amount.
    pub fn from_units(units: u128) -> Self {
        Self { units, scale: 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Parse a decimal string such as `"200"` or `"12.50"`.
    pub fn parse(raw: &str) -> Result<Self, BrvsError> {
        let invalid = || BrvsError::InvalidAmount(raw.to_string());
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((i, f)) => (i, f),
            None => (raw, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        if scale > MAX_SCALE {
            return Err(invalid());
        }
        let digits = format!("{int_part}{frac_part}");
        let units = if digits.is_empty() {
            0
        } else {
            digits.parse::<u128>().map_err(|_| invalid())?
        };
        Ok(Self { units, scale })
    }

    /// Bring both amounts to the same scale. `None` on overflow.
    fn aligned(self, other: Self) -> Option<(u128, u128, u8)> {
        let scale = self.scale.max(other.scale);
        let lhs = self
            .units
            .checked_mul(10u128.checked_pow(u32::from(scale - self.scale))?)?;
        let rhs = other
            .units
            .checked_mul(10u128.checked_pow(u32::from(scale - other.scale))?)?;
        Some((lhs, rhs, scale))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let (lhs, rhs, scale) = self.aligned(other)?;
        Some(Self {
            units: lhs.checked_add(rhs)?,
            scale,
        })
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        let (lhs, rhs, scale) = self.aligned(other)?;
        Some(Self {
            units: lhs.checked_sub(rhs)?,
            scale,
        })
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.aligned(*other) {
            Some((lhs, rhs, _)) => lhs.cmp(&rhs),
            // Only the lower-scale side is ever multiplied, so it is the one that overflowed.
            None if self.scale < other.scale => Ordering::Greater,
            None => Ordering::Less,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let divisor = 10u128.pow(u32::from(self.scale));
        write!(
            f,
            "{}.{:0width$}",
            self.units / divisor,
            self.units % divisor,
            width = usize::from(self.scale)
        )
    }
}

impl FromStr for Amount {
    type Err = BrvsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = BrvsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> Self {
        a.to_string()
    }
}
