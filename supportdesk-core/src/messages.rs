//! Chat message and thinking-trace types.
//!
//! These are the shapes exchanged with the support backend and held by the
//! client-side conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;
use crate::identifier::{
    generate_temp_assistant_id, generate_temp_message_id, now_utc, ConversationId,
};

/// Body of the request that opens a chat stream.
///
/// A missing `conversation_id` asks the backend to start a new conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User sending the message.
    pub user_id: String,
    /// Existing conversation to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Message text.
    pub message: String,
}

impl ChatRequest {
    /// Create a request that starts a new conversation.
    #[must_use]
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: None,
            message: message.into(),
        }
    }

    /// Continue an existing conversation.
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Whether this request starts a new conversation.
    #[must_use]
    pub fn is_new_conversation(&self) -> bool {
        self.conversation_id.is_none()
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user.
    User,
    /// Support assistant.
    Assistant,
    /// System notice.
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID. Locally created messages carry a `temp-` ID.
    pub message_id: String,
    /// Author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Backend-provided metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Message {
    /// Create an optimistic user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            message_id: generate_temp_message_id(),
            role: MessageRole::User,
            content: content.into(),
            created_at: now_utc(),
            metadata: None,
        }
    }

    /// Create the empty assistant message that streamed content fills in.
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self {
            message_id: generate_temp_assistant_id(),
            role: MessageRole::Assistant,
            content: String::new(),
            created_at: now_utc(),
            metadata: None,
        }
    }

    /// Whether the message has no content yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether this is an assistant message.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}

/// Summary of a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Conversation ID.
    pub conversation_id: ConversationId,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Number of messages in the thread.
    pub message_count: u32,
}

/// Coarse reasoning stage the backend reports before content starts.
///
/// "Not thinking" is represented as `Option::<ThinkingPhase>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingPhase {
    /// Recalling user memories.
    Memory,
    /// Planning the answer.
    Planning,
    /// Searching the knowledge base.
    Searching,
    /// Generating the answer.
    Generating,
}

impl ThinkingPhase {
    /// All phases in the order the backend normally emits them.
    pub const ALL: [ThinkingPhase; 4] = [
        ThinkingPhase::Memory,
        ThinkingPhase::Planning,
        ThinkingPhase::Searching,
        ThinkingPhase::Generating,
    ];

    /// Wire name of the phase.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Planning => "planning",
            Self::Searching => "searching",
            Self::Generating => "generating",
        }
    }

    /// Human-readable label for status indicators.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "Recalling context...",
            Self::Planning => "Planning a response...",
            Self::Searching => "Searching knowledge base...",
            Self::Generating => "Generating response...",
        }
    }
}

impl fmt::Display for ThinkingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkingPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "planning" => Ok(Self::Planning),
            "searching" => Ok(Self::Searching),
            "generating" => Ok(Self::Generating),
            other => Err(CoreError::invalid_value("phase", other)),
        }
    }
}

/// One thinking-phase utterance received before content started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingEntry {
    /// Phase the utterance belongs to.
    pub phase: ThinkingPhase,
    /// Utterance text.
    pub content: String,
    /// When the entry was received.
    pub timestamp: DateTime<Utc>,
}

impl ThinkingEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(phase: ThinkingPhase, content: impl Into<String>) -> Self {
        Self {
            phase,
            content: content.into(),
            timestamp: now_utc(),
        }
    }
}
