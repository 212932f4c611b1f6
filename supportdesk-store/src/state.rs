//! Observable chat state.

use serde::{Deserialize, Serialize};
use supportdesk_core::{ConversationId, Message, ThinkingEntry, ThinkingPhase};

/// Snapshot of everything a chat view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    /// User the requests are sent as.
    pub user_id: String,
    /// Conversation being shown; `None` starts a new one on the next send.
    pub current_thread_id: Option<ConversationId>,
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// A stream is open.
    pub is_streaming: bool,
    /// Current thinking phase, cleared by the first content chunk.
    pub thinking_phase: Option<ThinkingPhase>,
    /// Thinking trace received before the first content chunk.
    pub thinking_entries: Vec<ThinkingEntry>,
    /// Content accumulated for the streaming reply.
    pub streaming_content: String,
    /// Last stream error shown to the user.
    pub error: Option<String>,
}

impl ChatState {
    /// Create an empty state for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Whether new input should be refused.
    #[must_use]
    pub fn is_input_locked(&self) -> bool {
        self.is_streaming || self.thinking_phase.is_some()
    }

    /// The assistant message currently receiving content.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_assistant())
    }

    pub(crate) fn clear_streaming(&mut self) {
        self.is_streaming = false;
        self.thinking_phase = None;
        self.thinking_entries.clear();
        self.streaming_content.clear();
    }

    pub(crate) fn retract_empty_messages(&mut self) {
        self.messages.retain(|m| !m.is_empty());
    }
}
