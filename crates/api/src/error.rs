use mari_core::FieldErrors;
use serde::Deserialize;
use thiserror::Error;

/// Everything a portal call can fail with, from the caller's point of view.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected input, field by field. Raised client-side before the request
    /// is built, or decoded from a 422 response.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The bearer credential was rejected; the caller must re-authenticate.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// No credential is held at all (nobody has signed in).
    #[error("not signed in")]
    NotAuthenticated,

    /// Network-level failure: connect, timeout, TLS.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-validation failure message.
    #[error("{0}")]
    Api(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }

    pub fn validation(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

/// Error body the API sends for non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_decodes_validation_shape() {
        let json = r#"{"message":"validation failed","errors":{"amount":["must be at least 0.10"]}}"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        let errors = body.errors.unwrap();
        assert_eq!(errors.messages_for("amount"), ["must be at least 0.10"]);
    }

    #[test]
    fn error_body_tolerates_bare_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"boom"}"#).unwrap();
        assert_eq!(body.message.as_deref(), Some("boom"));
        assert!(body.errors.is_none());
    }
}
