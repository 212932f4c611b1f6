//! # supportdesk-store
//!
//! Conversation state for a support chat client.
//!
//! [`ChatStore`] sends messages through a
//! [`ChatStreamController`](supportdesk_streaming::ChatStreamController) and
//! folds the stream callbacks into a [`ChatState`] snapshot:
//!
//! - sending sets the thinking phase to memory right away
//! - thinking entries accumulate until the first content chunk, which
//!   clears them; later thinking events are ignored
//! - on error the empty assistant placeholder is removed and an error
//!   notification is published to the [`NotificationHub`]

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod notifications;
pub mod state;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use notifications::{Notification, NotificationHub, NotificationKind};
pub use state::ChatState;
pub use store::ChatStore;
