//! Money amounts in minor units.
//!
//! The platform quotes all amounts with two decimal places. Arithmetic and
//! comparisons happen on integer cents; the decimal form only exists at the
//! parse/format boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minor units per major unit
pub const CENTS_PER_UNIT: u64 = 100;

/// Smallest amount the platform accepts for a deposit (0.10 units)
pub const MIN_DEPOSIT: Amount = Amount(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a valid decimal: {0}")]
    Malformed(String),

    #[error("amount has more than two decimal places: {0}")]
    TooPrecise(String),

    #[error("amount is too large: {0}")]
    Overflow(String),
}

/// A non-negative money amount stored as integer cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: u64) -> Self {
        Amount(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal string like "5", "5.5" or "5.00" into cents.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let s = input.trim();
        if s.is_empty() || s.starts_with('+') || s.starts_with('-') {
            return Err(MoneyError::Malformed(input.to_string()));
        }

        let (whole, frac) = match s.split_once('.') {
            Some((_, "")) => return Err(MoneyError::Malformed(input.to_string())),
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyError::Malformed(input.to_string()));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyError::Malformed(input.to_string()));
        }
        if frac.len() > 2 {
            return Err(MoneyError::TooPrecise(input.to_string()));
        }

        let units: u64 = whole
            .parse()
            .map_err(|_| MoneyError::Overflow(input.to_string()))?;

        let frac_cents: u64 = if frac.is_empty() {
            0
        } else {
            let parsed: u64 = frac
                .parse()
                .map_err(|_| MoneyError::Malformed(input.to_string()))?;
            if frac.len() == 1 {
                parsed * 10
            } else {
                parsed
            }
        };

        let cents = units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(|| MoneyError::Overflow(input.to_string()))?;

        Ok(Amount(cents))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / CENTS_PER_UNIT, self.0 % CENTS_PER_UNIT)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = MoneyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Amount::parse(&s)
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> String {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fractional() {
        assert_eq!(Amount::parse("5").unwrap(), Amount::from_cents(500));
        assert_eq!(Amount::parse("5.5").unwrap(), Amount::from_cents(550));
        assert_eq!(Amount::parse("5.00").unwrap(), Amount::from_cents(500));
        assert_eq!(Amount::parse("0.10").unwrap(), Amount::from_cents(10));
        assert_eq!(Amount::parse(" 12.34 ").unwrap(), Amount::from_cents(1234));
        assert_eq!(Amount::parse("0").unwrap(), Amount::ZERO);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "-1", "+1", "1.234", "abc", "1,00", ".5", "1.", "1.x"] {
            assert!(Amount::parse(bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn formats_two_decimal_places() {
        assert_eq!(Amount::from_cents(500).to_string(), "5.00");
        assert_eq!(Amount::from_cents(10).to_string(), "0.10");
        assert_eq!(Amount::from_cents(1).to_string(), "0.01");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn serde_round_trips_as_decimal_string() {
        let a = Amount::from_cents(550);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"5.50\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn min_deposit_is_ten_cents() {
        assert_eq!(MIN_DEPOSIT, Amount::parse("0.10").unwrap());
        assert!(Amount::parse("0.09").unwrap() < MIN_DEPOSIT);
    }
}
