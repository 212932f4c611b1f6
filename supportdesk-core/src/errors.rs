//! Error types for supportdesk.
//!
//! Also provides the decoding of the backend's structured error body, which
//! every non-2xx response carries as `{"detail": "..."}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when an error body parses but carries no usable detail.
pub const GENERIC_REQUEST_FAILURE: &str = "Failed to start chat stream";

/// Core errors (configuration and value parsing).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A field held a value outside its domain.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Offending value.
        value: String,
    },
}

impl CoreError {
    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Structured error body returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error detail. Usually a string; validation failures send a list.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    /// Status code echoed by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ApiErrorBody {
    /// Extract a presentable message from the detail field.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Build the user-facing message for a failed HTTP response.
///
/// Uses the `detail` field of a JSON body when present. A body that is not
/// JSON falls back to `HTTP <status>: <reason>`; any JSON body without a
/// usable detail, including arrays and bare strings, falls back to
/// [`GENERIC_REQUEST_FAILURE`].
#[must_use]
pub fn http_error_message(status: u16, reason: Option<&str>, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => ApiErrorBody {
            detail: value.get("detail").cloned(),
            status_code: None,
        }
        .message()
        .unwrap_or_else(|| GENERIC_REQUEST_FAILURE.to_string()),
        Err(_) => format!("HTTP {}: {}", status, reason.unwrap_or_default()),
    }
}
