//! # supportdesk-streaming
//!
//! Streaming chat protocol handling for the supportdesk client.
//!
//! The backend answers a chat request with a chunked SSE body of
//! `data: <json>` lines terminated by `data: [DONE]` or a status record.
//! This crate decodes that body incrementally and routes each record to one
//! of three channels: thinking trace, content, and terminal status.
//!
//! ## Core Concepts
//!
//! - **[`StreamDecoder`]**: byte chunks in, parsed records out, tolerant of
//!   arbitrary fragmentation
//! - **[`ChatStreamEvent`]**: closed classification of a record
//! - **[`ChatStreamController`]**: opens a stream, drives the decoder, and
//!   calls a [`StreamHandler`]; returns a [`StreamHandle`] for cancellation
//! - **[`ChatTransport`]**: the fetch-like seam; [`HttpTransport`] is the
//!   `reqwest` implementation
//!
//! ## Guarantees
//!
//! Per session, callbacks fire in decode order, and exactly one of
//! `on_complete` / `on_error` fires unless the session is cancelled, in which
//! case neither does. Cancelling twice, or after the session ended, does
//! nothing.
//!
//! ## Example
//!
//! ```ignore
//! use supportdesk_core::{ChatRequest, ClientConfig};
//! use supportdesk_streaming::{Callbacks, ChatStreamController};
//!
//! let controller = ChatStreamController::from_config(&ClientConfig::from_env()?)?;
//! let handle = controller.open(
//!     ChatRequest::new("alice", "Where is my order?"),
//!     Callbacks::new(|chunk| print!("{chunk}"), || println!(), |err| eprintln!("{err}"))
//!         .with_thinking(|phase, text| eprintln!("[{phase}] {text}")),
//! );
//! handle.finished().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod controller;
pub mod decoder;
pub mod error;
pub mod events;
pub mod handler;
pub mod mock;
pub mod session;
pub mod transport;

// Re-exports
pub use controller::{ChatStreamController, StreamOptions};
pub use decoder::{DecodedRecord, DecodedStream, StreamDecoder};
pub use error::{StreamError, StreamResult};
pub use events::{ChatStreamEvent, StreamEvent};
pub use handler::{Callbacks, StreamHandler};
pub use session::{CancelHandle, SessionState, StreamHandle};
pub use transport::{ByteStream, ChatTransport, HttpTransport};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Callbacks, CancelHandle, ChatStreamController, ChatStreamEvent, ChatTransport,
        SessionState, StreamError, StreamHandle, StreamHandler, StreamOptions, StreamResult,
    };
}
