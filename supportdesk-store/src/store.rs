//! The chat store: sends messages and folds stream callbacks into
//! [`ChatState`].

use crate::error::{StoreError, StoreResult};
use crate::notifications::NotificationHub;
use crate::state::ChatState;
use parking_lot::Mutex;
use std::sync::Arc;
use supportdesk_core::{
    ChatRequest, ClientConfig, ConversationId, Message, ThinkingEntry, ThinkingPhase,
};
use supportdesk_streaming::{
    CancelHandle, ChatStreamController, StreamError, StreamHandle, StreamHandler,
};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    state: ChatState,
    active: Option<CancelHandle>,
    generation: u64,
}

impl Inner {
    /// Cancel the open stream, if any, and drop its partial state.
    fn cancel_active(&mut self) -> bool {
        let Some(handle) = self.active.take() else {
            return false;
        };
        self.generation += 1;
        let cancelled = handle.cancel();
        if cancelled {
            debug!(session_id = %handle.session_id(), "cancelled active chat stream");
        }
        self.state.clear_streaming();
        self.state.retract_empty_messages();
        cancelled
    }
}

/// Chat conversation state driven by a [`ChatStreamController`].
///
/// At most one stream is open per store: sending a message cancels the
/// previous stream first. Callbacks from a superseded stream never touch
/// the state.
///
/// # Example
///
/// ```ignore
/// use supportdesk_store::{ChatStore, NotificationHub};
///
/// let store = ChatStore::new(controller, NotificationHub::new(), "alice");
/// store.send_message("Where is my order?")?;
/// let state = store.state();
/// ```
#[derive(Debug, Clone)]
pub struct ChatStore {
    inner: Arc<Mutex<Inner>>,
    controller: ChatStreamController,
    notifications: NotificationHub,
}

impl ChatStore {
    /// Create a store for `user_id`.
    pub fn new(
        controller: ChatStreamController,
        notifications: NotificationHub,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ChatState::new(user_id),
                ..Default::default()
            })),
            controller,
            notifications,
        }
    }

    /// Create a store talking HTTP to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn from_config(config: &ClientConfig, notifications: NotificationHub) -> StoreResult<Self> {
        let controller = ChatStreamController::from_config(config)?;
        Ok(Self::new(controller, notifications, config.user_id.clone()))
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ChatState {
        self.inner.lock().state.clone()
    }

    /// The notification hub errors are published to.
    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Whether new input should be refused.
    #[must_use]
    pub fn is_input_locked(&self) -> bool {
        self.inner.lock().state.is_input_locked()
    }

    /// Send a message and stream the reply into the state.
    ///
    /// The user message and an empty assistant message are appended at once
    /// and the thinking phase is set to memory before the request goes out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyMessage`] if `content` is blank. Stream
    /// failures are reported through the state and the notification hub,
    /// not here.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn send_message(&self, content: &str) -> StoreResult<StreamHandle> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let mut inner = self.inner.lock();
        inner.cancel_active();
        inner.generation += 1;

        let state = &mut inner.state;
        state.messages.push(Message::user(content));
        state.messages.push(Message::assistant_placeholder());
        state.is_streaming = true;
        state.thinking_phase = Some(ThinkingPhase::Memory);
        state.thinking_entries.clear();
        state.streaming_content.clear();
        state.error = None;

        let mut request = ChatRequest::new(state.user_id.clone(), content);
        if let Some(thread) = &state.current_thread_id {
            request = request.with_conversation(thread.clone());
        }

        let handler = StoreHandler {
            inner: Arc::clone(&self.inner),
            notifications: self.notifications.clone(),
            generation: inner.generation,
            content_started: false,
        };
        let handle = self.controller.open(request, handler);
        debug!(session_id = %handle.session_id(), "message sent");
        inner.active = Some(handle.cancel_handle());
        Ok(handle)
    }

    /// Cancel the open stream. Returns `false` if nothing was streaming.
    pub fn cancel_stream(&self) -> bool {
        self.inner.lock().cancel_active()
    }

    /// Leave the current conversation; the next send starts a new one.
    pub fn start_new_chat(&self) {
        let mut inner = self.inner.lock();
        inner.cancel_active();
        inner.state.current_thread_id = None;
        inner.state.messages.clear();
        inner.state.error = None;
    }

    /// Show an existing conversation with its loaded history.
    pub fn select_thread(&self, thread_id: Option<ConversationId>, messages: Vec<Message>) {
        let mut inner = self.inner.lock();
        inner.cancel_active();
        inner.state.current_thread_id = thread_id;
        inner.state.messages = messages;
        inner.state.error = None;
    }

    /// Adopt the conversation the backend created for a new chat.
    ///
    /// Unlike [`select_thread`](Self::select_thread) this keeps the messages
    /// and any open stream; later sends continue this conversation.
    pub fn set_current_thread(&self, thread_id: ConversationId) {
        let mut inner = self.inner.lock();
        debug!(conversation_id = %thread_id, "current thread set");
        inner.state.current_thread_id = Some(thread_id);
    }

    /// Change the user requests are sent as.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.inner.lock().state.user_id = user_id.into();
    }

    /// Drop everything except the user id, e.g. on persona switch.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.cancel_active();
        let user_id = std::mem::take(&mut inner.state.user_id);
        inner.state = ChatState::new(user_id);
        info!("chat state reset");
    }

    /// Clear the last error.
    pub fn clear_error(&self) {
        self.inner.lock().state.error = None;
    }
}

/// Folds one session's callbacks into the shared state.
struct StoreHandler {
    inner: Arc<Mutex<Inner>>,
    notifications: NotificationHub,
    generation: u64,
    content_started: bool,
}

impl StoreHandler {
    fn with_current<F: FnOnce(&mut Inner)>(&self, f: F) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != self.generation {
            return false;
        }
        f(&mut inner);
        true
    }
}

impl StreamHandler for StoreHandler {
    fn on_chunk(&mut self, chunk: &str) {
        let first = !self.content_started;
        self.content_started = true;
        self.with_current(|inner| {
            let state = &mut inner.state;
            if first {
                state.thinking_phase = None;
                state.thinking_entries.clear();
            }
            state.streaming_content.push_str(chunk);
            let content = state.streaming_content.clone();
            if let Some(last) = state.messages.last_mut().filter(|m| m.is_assistant()) {
                last.content = content;
            }
        });
    }

    fn on_thinking(&mut self, phase: ThinkingPhase, content: &str) {
        if self.content_started {
            return;
        }
        self.with_current(|inner| {
            inner.state.thinking_phase = Some(phase);
            inner.state.thinking_entries.push(ThinkingEntry::new(phase, content));
        });
    }

    fn on_complete(&mut self) {
        self.with_current(|inner| {
            inner.active = None;
            inner.state.clear_streaming();
        });
    }

    fn on_error(&mut self, error: StreamError) {
        let message = error.message();
        let current = self.with_current(|inner| {
            inner.active = None;
            inner.state.clear_streaming();
            inner.state.retract_empty_messages();
            inner.state.error = Some(message.clone());
        });
        if current {
            self.notifications.error(message);
        }
    }
}
