//! # supportdesk
//!
//! Rust client for a streaming customer-support chat backend.
//!
//! The backend answers `POST /chat/stream` with a Server-Sent Events body.
//! Each `data:` record carries reply content, a thinking-trace step
//! (memory, planning, searching, generating), or a terminal status. This
//! crate decodes that body, routes records to callbacks, and keeps
//! conversation state for a chat view.
//!
//! ## Quick Start
//!
//! ```ignore
//! use supportdesk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_tracing(&TelemetryConfig::default())?;
//!
//!     let config = ClientConfig::from_env()?;
//!     let controller = ChatStreamController::from_config(&config)?;
//!     let handle = controller.open(
//!         ChatRequest::new(config.user_id.clone(), "Where is my order?"),
//!         Callbacks::new(|chunk| print!("{chunk}"), || println!(), |e| eprintln!("{e}")),
//!     );
//!     handle.finished().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`supportdesk_core`] - request, message, and thinking types; client
//!   configuration
//! - [`supportdesk_streaming`] - SSE decoding, event classification, stream
//!   sessions
//! - [`supportdesk_store`] - conversation state and notifications

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod telemetry;

/// Domain types and configuration.
pub use supportdesk_core as core;

/// Stream decoding and sessions.
pub use supportdesk_streaming as streaming;

/// Conversation state.
pub use supportdesk_store as store;

pub use supportdesk_core::{
    ChatRequest, ClientConfig, ConversationId, CoreError, Message, MessageRole, ThinkingEntry,
    ThinkingPhase, Thread,
};
pub use supportdesk_store::{
    ChatState, ChatStore, Notification, NotificationHub, NotificationKind, StoreError,
};
pub use supportdesk_streaming::{
    Callbacks, CancelHandle, ChatStreamController, ChatStreamEvent, ChatTransport,
    HttpTransport, SessionState, StreamDecoder, StreamError, StreamEvent, StreamHandle,
    StreamHandler, StreamOptions,
};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};

/// Prelude for common imports.
///
/// ```ignore
/// use supportdesk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::telemetry::{init_tracing, TelemetryConfig};
    pub use supportdesk_core::{ChatRequest, ClientConfig, ConversationId, ThinkingPhase};
    pub use supportdesk_store::{ChatState, ChatStore, NotificationHub};
    pub use supportdesk_streaming::{
        Callbacks, CancelHandle, ChatStreamController, SessionState, StreamError,
        StreamHandle, StreamHandler,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::streaming::mock::ScriptedTransport;

    #[tokio::test]
    async fn test_prelude_end_to_end() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"event\":\"thinking\",\"phase\":\"memory\",\"content\":\"recall\"}\n")
            .chunk("data: {\"content\":\"Your order ships today.\"}\n")
            .chunk("data: {\"status\":\"completed\"}\n");
        let store = ChatStore::new(
            ChatStreamController::new(transport),
            NotificationHub::new(),
            "alice",
        );

        let handle = store.send_message("Where is my order?").unwrap();
        assert_eq!(handle.finished().await, SessionState::Completed);

        let state: ChatState = store.state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "Your order ships today.");
        assert!(!state.is_input_locked());
    }

    #[test]
    fn test_config_reexport() {
        let config = ClientConfig::new();
        assert_eq!(config.chat_stream_url().unwrap().path(), "/chat/stream");
    }
}
