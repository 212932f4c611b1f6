//! # supportdesk-core
//!
//! Core types, configuration, and error handling for the supportdesk chat
//! client.
//!
//! - **Messages**: chat request, messages, threads, thinking phases and entries
//! - **Errors**: core error type and backend error-body decoding
//! - **Config**: client configuration and endpoint table
//! - **Identifiers**: temporary message IDs and conversation IDs
//!
//! ## Example
//!
//! ```rust
//! use supportdesk_core::{ChatRequest, ClientConfig};
//!
//! let config = ClientConfig::default().with_user_id("alice");
//! let request = ChatRequest::new(&config.user_id, "Where is my order?");
//! assert!(request.is_new_conversation());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod identifier;
pub mod messages;

pub use config::{endpoints, ClientConfig};
pub use errors::{http_error_message, ApiErrorBody, CoreError, Result};
pub use identifier::{now_utc, ConversationId};
pub use messages::{ChatRequest, Message, MessageRole, ThinkingEntry, ThinkingPhase, Thread};
