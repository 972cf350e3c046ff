//! Per-field validation errors.
//!
//! Both the client-side checks and the remote API report problems the same
//! way: a map from field name to one or more messages. `BTreeMap` keeps the
//! rendering order stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errs = Self::new();
        errs.push(field, message);
        errs
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Return `Ok(())` when empty, otherwise hand the collected errors back.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_per_field() {
        let mut errs = FieldErrors::new();
        errs.push("amount", "must be at least 0.10");
        errs.push("phone", "not a mobile number");
        errs.push("phone", "too short");

        assert!(!errs.is_empty());
        assert_eq!(errs.messages_for("phone").len(), 2);
        assert_eq!(errs.messages_for("missing"), &[] as &[String]);
        assert_eq!(
            errs.to_string(),
            "amount: must be at least 0.10; phone: not a mobile number; phone: too short"
        );
    }

    #[test]
    fn deserializes_from_api_error_shape() {
        let json = r#"{"amount":["must be at least 0.10"],"phone":["invalid"]}"#;
        let errs: FieldErrors = serde_json::from_str(json).unwrap();
        assert_eq!(errs.messages_for("amount"), ["must be at least 0.10"]);
    }

    #[test]
    fn into_result_distinguishes_empty() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(FieldErrors::single("pin", "required").into_result().is_err());
    }
}
