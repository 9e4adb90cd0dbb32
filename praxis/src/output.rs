//! The uniform result wrapper returned by every tool and agent call.
//!
//! [`ToolOutput`] is algebraic: either a JSON payload or a [`ToolError`].
//! An errored output never observably produces a payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Success-or-error wrapper around a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutput {
    /// A successful call carrying its payload.
    Payload(Value),
    /// A failed call carrying the error.
    Error(ToolError),
}

impl ToolOutput {
    /// Create a successful output from any serializable payload.
    ///
    /// Serialization failures degrade to an errored output rather than
    /// panicking; `execute` implementations stay total.
    #[must_use]
    pub fn ok(payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::Payload(value),
            Err(e) => Self::Error(ToolError::Execution(e.to_string())),
        }
    }

    /// Create a successful output from a raw JSON value.
    #[must_use]
    pub const fn ok_value(payload: Value) -> Self {
        Self::Payload(payload)
    }

    /// Create a failed output.
    #[must_use]
    pub const fn err(error: ToolError) -> Self {
        Self::Error(error)
    }

    /// Create a failed output from a plain message.
    #[must_use]
    pub fn err_msg(message: impl Into<String>) -> Self {
        Self::Error(ToolError::Execution(message.into()))
    }

    /// Whether this output carries an error.
    #[must_use]
    pub const fn errored(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ToolError> {
        match self {
            Self::Error(e) => Some(e),
            Self::Payload(_) => None,
        }
    }

    /// The payload, if the call succeeded.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Payload(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// Consume the output, returning the payload if the call succeeded.
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Self::Payload(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// Canonical string form of the payload.
    ///
    /// Strings pass through verbatim, other primitives via their JSON
    /// rendering, and structured payloads serialize to canonical JSON.
    pub fn text(&self) -> Result<String, ToolError> {
        match self {
            Self::Error(e) => Err(e.clone()),
            Self::Payload(Value::String(s)) => Ok(s.clone()),
            Self::Payload(Value::Null) => Ok(String::new()),
            Self::Payload(v) => {
                serde_json::to_string(v).map_err(|e| ToolError::Execution(e.to_string()))
            }
        }
    }

    /// JSON bytes of the payload (not of the wrapper).
    pub fn to_json(&self) -> Result<Vec<u8>, ToolError> {
        match self {
            Self::Error(e) => Err(e.clone()),
            Self::Payload(v) => {
                serde_json::to_vec(v).map_err(|e| ToolError::Execution(e.to_string()))
            }
        }
    }

    /// Render the output the way a model should see it.
    ///
    /// Successful outputs use their canonical string form; failures render
    /// as `Error: <message>`.
    #[must_use]
    pub fn render(&self) -> String {
        match self.text() {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolOutput {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(v) => Self::Payload(v),
            Err(e) => Self::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn errored_output_has_no_payload() {
        let out = ToolOutput::err_msg("boom");
        assert!(out.errored());
        assert!(out.payload().is_none());
        assert!(out.text().is_err());
        assert!(out.to_json().is_err());
    }

    #[test]
    fn string_payload_passes_through() {
        let out = ToolOutput::ok("plain text");
        assert_eq!(out.text().expect("text"), "plain text");
    }

    #[test]
    fn primitive_payload_uses_json_form() {
        assert_eq!(ToolOutput::ok(42).text().expect("text"), "42");
        assert_eq!(ToolOutput::ok(true).text().expect("text"), "true");
        assert_eq!(ToolOutput::ok_value(Value::Null).text().expect("text"), "");
    }

    #[test]
    fn structured_payload_serializes_to_json() {
        let out = ToolOutput::ok(json!({"a": [1, 2]}));
        assert_eq!(out.text().expect("text"), r#"{"a":[1,2]}"#);
        assert_eq!(out.to_json().expect("bytes"), br#"{"a":[1,2]}"#.to_vec());
    }

    #[test]
    fn render_prefixes_errors() {
        let out = ToolOutput::err(ToolError::NotFound("x".into()));
        assert_eq!(out.render(), "Error: tool not found: x");
    }

    #[test]
    fn serde_roundtrip() {
        for out in [
            ToolOutput::ok(json!({"k": "v"})),
            ToolOutput::err_msg("bad"),
        ] {
            let json = serde_json::to_string(&out).expect("serialize");
            let back: ToolOutput = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, out);
        }
    }
}
