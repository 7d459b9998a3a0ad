//! Exact conversion between display USD and stablecoin base units.
//!
//! All monetary values cross the contract boundary as integer base units of
//! a 6-decimal token. Display conversion divides by 10^6 and rounds half-up
//! to whole cents. Both directions use integer arithmetic only.

use std::fmt;

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Decimal places of the stablecoin.
pub const TOKEN_DECIMALS: u32 = 6;

/// Base units per whole token (10^6).
pub const UNITS_PER_TOKEN: u128 = 1_000_000;

/// Base units per display cent (10^4).
pub const UNITS_PER_CENT: u128 = 10_000;

/// Errors from parsing a display amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// Empty or whitespace-only input.
    #[error("amount is empty")]
    Empty,

    /// Input contains characters other than digits and one decimal point.
    #[error("amount '{0}' is not a decimal number")]
    Malformed(String),

    /// Negative amounts are never valid at this boundary.
    #[error("amount must not be negative")]
    Negative,

    /// More fractional digits than the token can represent.
    #[error("amount has more than {TOKEN_DECIMALS} decimal places")]
    TooPrecise,

    /// Amount does not fit in the base-unit representation.
    #[error("amount is too large")]
    Overflow,
}

/// A token amount in integer base units (6 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a display amount like "50", "50.2" or "50.25".
    ///
    /// Accepts up to 6 fractional digits (exact base-unit precision).
    pub fn from_usd_str(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Malformed(input.to_string()));
        }
        if frac.len() > TOKEN_DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Malformed(input.to_string()));
        }

        let whole_part: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_part: u128 = if frac.is_empty() {
            0
        } else {
            let digits: u128 = frac.parse().map_err(|_| AmountError::Overflow)?;
            digits * 10u128.pow(TOKEN_DECIMALS - frac.len() as u32)
        };

        whole_part
            .checked_mul(UNITS_PER_TOKEN)
            .and_then(|u| u.checked_add(frac_part))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Format as a display USD string, rounded half-up to 2 decimal places.
    pub fn to_usd_string(self) -> String {
        let cents = (self.0 + UNITS_PER_CENT / 2) / UNITS_PER_CENT;
        format!("{}.{:02}", cents / 100, cents % 100)
    }

    pub fn as_u256(self) -> U256 {
        U256::from(self.0)
    }

    /// Convert from a contract-sized integer, rejecting values beyond u128.
    pub fn from_u256(value: U256) -> Result<Self, AmountError> {
        u128::try_from(value).map(Self).map_err(|_| AmountError::Overflow)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Amounts travel on the wire as base-unit decimal strings, never as JSON
// numbers (u128 does not survive every JSON parser).
impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map(Self)
            .map_err(|_| serde::de::Error::custom("expected base-unit amount string"))
    }
}
