//! Streaming errors.

use std::time::Duration;
use thiserror::Error;

/// Message used for an in-band error record that carries no text.
pub const GENERIC_STREAM_ERROR: &str = "Stream error";

/// Errors that can end a chat stream.
///
/// The `Display` output of each variant is suitable for showing to the user.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Non-2xx response. `message` comes from the error body's `detail`
    /// field, or `HTTP <status>: <reason>` when there is none.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Presentable message.
        message: String,
    },

    /// Connection or body read failure.
    #[error("Connection error: {0}")]
    Transport(String),

    /// The backend reported an error inside the stream.
    #[error("{0}")]
    Stream(String),

    /// No bytes arrived within the idle window.
    #[error("Stream idle for {0:?}")]
    Timeout(Duration),

    /// A single SSE line grew past the decoder's limit.
    #[error("SSE line exceeded {0} bytes")]
    BufferOverflow(usize),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request body could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Create an HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an in-band stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// The text shown to the user for this failure.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status, if the error came from a rejected response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error happened below the SSE layer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_) | Self::Timeout(_))
    }

    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http(
                status.as_u16(),
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ),
            ),
            None if err.is_timeout() => Self::transport(format!("request timed out: {err}")),
            None => Self::transport(format!("failed to reach chat service: {err}")),
        }
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StreamError::stream("backend down").to_string(), "backend down");
        assert_eq!(StreamError::http(500, "internal failure").to_string(), "internal failure");
        assert_eq!(
            StreamError::Timeout(Duration::from_secs(30)).to_string(),
            "Stream idle for 30s"
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(StreamError::http(404, "missing").status(), Some(404));
        assert_eq!(StreamError::stream("x").status(), None);
    }

    #[test]
    fn test_classification() {
        assert!(StreamError::transport("reset").is_transport());
        assert!(!StreamError::stream("bad").is_transport());
        assert!(StreamError::http(503, "busy").is_retryable());
        assert!(!StreamError::http(400, "bad").is_retryable());
        assert!(!StreamError::stream("bad").is_retryable());
    }

    #[test]
    fn test_json_error_converts() {
        let err: StreamError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, StreamError::Json(_)));
        assert!(err.to_string().starts_with("JSON error: "));
        assert!(!err.is_retryable());
    }
}
