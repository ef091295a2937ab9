//! Classified dispatch outcomes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the fuzzer keeps from one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// HTTP status code.
    pub status_code: u16,
    /// OData error code, when the body carried one.
    pub error_code: Option<String>,
    /// OData error message, when the body carried one.
    pub error_message: Option<String>,
    /// Time until the response headers arrived.
    pub elapsed: Duration,
}

impl Outcome {
    /// Creates an outcome without error fields.
    #[must_use]
    pub const fn new(status_code: u16, elapsed: Duration) -> Self {
        Self {
            status_code,
            error_code: None,
            error_message: None,
            elapsed,
        }
    }

    /// Attaches the error fields parsed from the response body.
    #[must_use]
    pub fn with_error_fields(
        mut self,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        self.error_code = error_code;
        self.error_message = error_message;
        self
    }

    /// True for any status other than 200.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.status_code != 200
    }
}

/// Extracts `(error_code, error_message)` from an OData response body.
///
/// Understands both the standard V2 shape
/// `{"error":{"code":...,"message":{"value":...}}}` and flat
/// `{"ErrorCode":...,"ErrorMessage":...}` payloads. Non-JSON bodies yield
/// nothing.
#[must_use]
pub fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };

    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(|c| c.as_str())
            .map(String::from);
        let message = error.get("message").and_then(|m| {
            m.get("value")
                .and_then(|v| v.as_str())
                .or_else(|| m.as_str())
                .map(String::from)
        });
        return (code, message);
    }

    let code = value
        .get("ErrorCode")
        .and_then(|c| c.as_str())
        .map(String::from);
    let message = value
        .get("ErrorMessage")
        .and_then(|m| m.as_str())
        .map(String::from);
    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_odata_v2_error_shape() {
        let body = r#"{"error":{"code":"SY/530","message":{"lang":"en","value":"Conversion failed"}}}"#;
        let (code, message) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("SY/530"));
        assert_eq!(message.as_deref(), Some("Conversion failed"));
    }

    #[test]
    fn parses_flat_error_shape() {
        let body = r#"{"ErrorCode":"DB","ErrorMessage":"deadlock"}"#;
        let (code, message) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("DB"));
        assert_eq!(message.as_deref(), Some("deadlock"));
    }

    #[test]
    fn plain_message_string_is_accepted() {
        let body = r#"{"error":{"code":"X","message":"boom"}}"#;
        let (code, message) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("X"));
        assert_eq!(message.as_deref(), Some("boom"));
    }

    #[test]
    fn non_json_bodies_yield_nothing() {
        assert_eq!(parse_error_body("<html>500</html>"), (None, None));
        assert_eq!(parse_error_body(""), (None, None));
    }

    #[test]
    fn outcome_classification() {
        let ok = Outcome::new(200, Duration::from_millis(80));
        let err = Outcome::new(500, Duration::from_secs(2));
        assert!(!ok.is_error());
        assert!(err.is_error());
    }
}
