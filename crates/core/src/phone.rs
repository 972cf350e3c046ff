//! MSISDN normalization for the mobile-money rails.
//!
//! The platform only talks to carriers in canonical international form:
//! `263` followed by a nine-digit mobile subscriber number. Users type
//! numbers with the local trunk prefix ("0771234567"), with a plus
//! ("+263771234567") or already canonical; everything else is rejected
//! before a request is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const COUNTRY_CODE: &str = "263";
const MOBILE_PREFIX: char = '7';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,

    #[error("phone number contains non-digit characters: {0}")]
    NonDigit(String),

    #[error("phone number is not a recognized mobile number: {0}")]
    InvalidFormat(String),
}

/// A mobile subscriber number in canonical international form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Msisdn(String);

impl Msisdn {
    /// Normalize user input to canonical form.
    ///
    /// "0771234567"    -> "263771234567"
    /// "+263771234567" -> "263771234567"
    /// "263771234567"  -> unchanged
    pub fn normalize(input: &str) -> Result<Self, PhoneError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        if compact.is_empty() {
            return Err(PhoneError::Empty);
        }

        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit(input.to_string()));
        }

        let canonical = if let Some(rest) = digits.strip_prefix('0') {
            format!("{COUNTRY_CODE}{rest}")
        } else {
            digits.to_string()
        };

        // 263 + 9-digit mobile number starting with 7
        let subscriber = canonical
            .strip_prefix(COUNTRY_CODE)
            .ok_or_else(|| PhoneError::InvalidFormat(input.to_string()))?;
        if subscriber.len() != 9 || !subscriber.starts_with(MOBILE_PREFIX) {
            return Err(PhoneError::InvalidFormat(input.to_string()));
        }

        Ok(Msisdn(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Msisdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_trunk_prefix_becomes_country_code() {
        let m = Msisdn::normalize("0771234567").unwrap();
        assert_eq!(m.as_str(), "263771234567");
    }

    #[test]
    fn plus_and_canonical_forms_accepted() {
        assert_eq!(
            Msisdn::normalize("+263771234567").unwrap().as_str(),
            "263771234567"
        );
        assert_eq!(
            Msisdn::normalize("263771234567").unwrap().as_str(),
            "263771234567"
        );
    }

    #[test]
    fn spaces_and_hyphens_ignored() {
        assert_eq!(
            Msisdn::normalize("077 123-4567").unwrap().as_str(),
            "263771234567"
        );
    }

    #[test]
    fn rejects_landlines_and_garbage() {
        assert_eq!(Msisdn::normalize(""), Err(PhoneError::Empty));
        assert!(matches!(
            Msisdn::normalize("0241234567"),
            Err(PhoneError::InvalidFormat(_))
        ));
        assert!(matches!(
            Msisdn::normalize("07712345"),
            Err(PhoneError::InvalidFormat(_))
        ));
        assert!(matches!(
            Msisdn::normalize("077one2345"),
            Err(PhoneError::NonDigit(_))
        ));
        assert!(matches!(
            Msisdn::normalize("447712345678"),
            Err(PhoneError::InvalidFormat(_))
        ));
    }
}
