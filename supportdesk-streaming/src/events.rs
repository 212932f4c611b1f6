//! Chat stream event types.
//!
//! A `data:` payload is first parsed into the loose wire shape
//! [`StreamEvent`], whose fields are all optional, and then immediately
//! classified into the closed [`ChatStreamEvent`] sum type. Nothing past the
//! decoder looks at raw fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use supportdesk_core::ThinkingPhase;

use crate::error::GENERIC_STREAM_ERROR;

/// Wire value of `event` marking a thinking record.
pub const THINKING_EVENT: &str = "thinking";
/// Wire value of `status` for normal completion.
pub const STATUS_COMPLETED: &str = "completed";
/// Wire value of `status` for an in-band failure.
pub const STATUS_ERROR: &str = "error";

/// One JSON record as sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Content or thinking text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `completed` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Event label; only `thinking` is meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Thinking phase name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl StreamEvent {
    /// A content record.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    /// A thinking record.
    pub fn thinking(phase: ThinkingPhase, text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            event: Some(THINKING_EVENT.to_string()),
            phase: Some(phase.as_str().to_string()),
            ..Default::default()
        }
    }

    /// A completion record.
    pub fn completed() -> Self {
        Self {
            status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        }
    }

    /// An error record.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(STATUS_ERROR.to_string()),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Classify the record into at most two events.
    ///
    /// The first event, if any, is non-terminal (thinking or content); the
    /// second, if any, is terminal. Rules, in priority order:
    ///
    /// 1. `event == "thinking"` with a known `phase` is thinking, never content.
    /// 2. `content` without any `event` is content.
    /// 3. `status == "completed"` completes the stream.
    /// 4. `status == "error"` or a non-empty `error` fails the stream.
    ///
    /// Empty content and thinking records with a missing or unknown phase
    /// produce nothing.
    #[must_use]
    pub fn classify(self) -> Vec<ChatStreamEvent> {
        let mut events = Vec::with_capacity(2);

        match self.event.as_deref() {
            Some(THINKING_EVENT) => {
                let phase = self.phase.as_deref().and_then(|p| p.parse().ok());
                match phase {
                    Some(phase) => events.push(ChatStreamEvent::Thinking {
                        phase,
                        content: self.content.unwrap_or_default(),
                    }),
                    None => tracing::debug!(phase = ?self.phase, "thinking record without a known phase"),
                }
            }
            Some(_) => {}
            None => {
                if let Some(content) = self.content.filter(|c| !c.is_empty()) {
                    events.push(ChatStreamEvent::Content(content));
                }
            }
        }

        let error = self.error.filter(|e| !e.is_empty());
        match self.status.as_deref() {
            Some(STATUS_COMPLETED) => events.push(ChatStreamEvent::Completed),
            Some(STATUS_ERROR) => events.push(ChatStreamEvent::Failed(
                error.unwrap_or_else(|| GENERIC_STREAM_ERROR.to_string()),
            )),
            _ => {
                if let Some(error) = error {
                    events.push(ChatStreamEvent::Failed(error));
                }
            }
        }

        events
    }
}

/// A classified stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    /// Reasoning trace emitted before content.
    Thinking {
        /// Phase label.
        phase: ThinkingPhase,
        /// Utterance text.
        content: String,
    },
    /// A fragment of the answer.
    Content(String),
    /// Normal end of stream.
    Completed,
    /// Backend-reported failure.
    Failed(String),
}

impl ChatStreamEvent {
    /// Whether this event ends the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for ChatStreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thinking { phase, content } => write!(f, "[thinking:{phase}] {content}"),
            Self::Content(text) => write!(f, "{text}"),
            Self::Completed => write!(f, "[completed]"),
            Self::Failed(message) => write!(f, "[error] {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Vec<ChatStreamEvent> {
        serde_json::from_str::<StreamEvent>(json).unwrap().classify()
    }

    #[test]
    fn test_content_record() {
        assert_eq!(
            parse(r#"{"content":"Hello"}"#),
            vec![ChatStreamEvent::Content("Hello".into())]
        );
    }

    #[test]
    fn test_thinking_wins_over_content() {
        assert_eq!(
            parse(r#"{"event":"thinking","phase":"searching","content":"looking up docs"}"#),
            vec![ChatStreamEvent::Thinking {
                phase: ThinkingPhase::Searching,
                content: "looking up docs".into(),
            }]
        );
    }

    #[test]
    fn test_thinking_without_content() {
        assert_eq!(
            parse(r#"{"event":"thinking","phase":"memory"}"#),
            vec![ChatStreamEvent::Thinking {
                phase: ThinkingPhase::Memory,
                content: String::new(),
            }]
        );
    }

    #[test]
    fn test_thinking_without_phase_is_not_content() {
        assert!(parse(r#"{"event":"thinking","content":"hmm"}"#).is_empty());
        assert!(parse(r#"{"event":"thinking","phase":"dreaming","content":"hmm"}"#).is_empty());
    }

    #[test]
    fn test_unknown_event_label_is_not_content() {
        assert!(parse(r#"{"event":"progress","content":"50%"}"#).is_empty());
    }

    #[test]
    fn test_content_then_completion_in_one_record() {
        assert_eq!(
            parse(r#"{"content":"bye","status":"completed"}"#),
            vec![ChatStreamEvent::Content("bye".into()), ChatStreamEvent::Completed]
        );
    }

    #[test]
    fn test_error_records() {
        assert_eq!(
            parse(r#"{"status":"error","error":"backend down"}"#),
            vec![ChatStreamEvent::Failed("backend down".into())]
        );
        assert_eq!(
            parse(r#"{"status":"error"}"#),
            vec![ChatStreamEvent::Failed(GENERIC_STREAM_ERROR.into())]
        );
        assert_eq!(
            parse(r#"{"error":"quota exceeded"}"#),
            vec![ChatStreamEvent::Failed("quota exceeded".into())]
        );
    }

    #[test]
    fn test_completed_takes_priority_over_error() {
        assert_eq!(
            parse(r#"{"status":"completed","error":"ignored"}"#),
            vec![ChatStreamEvent::Completed]
        );
    }

    #[test]
    fn test_empty_record() {
        assert!(parse("{}").is_empty());
        assert!(parse(r#"{"content":""}"#).is_empty());
        assert!(parse(r#"{"status":"pending"}"#).is_empty());
    }

    #[test]
    fn test_constructors_classify() {
        assert_eq!(
            StreamEvent::thinking(ThinkingPhase::Planning, "plan").classify(),
            vec![ChatStreamEvent::Thinking {
                phase: ThinkingPhase::Planning,
                content: "plan".into()
            }]
        );
        assert_eq!(StreamEvent::completed().classify(), vec![ChatStreamEvent::Completed]);
        assert!(StreamEvent::failed("x").classify()[0].is_terminal());
    }
}
