//! Error types for the chat store.

use supportdesk_streaming::StreamError;
use thiserror::Error;

/// Errors returned by [`ChatStore`](crate::ChatStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The message was empty after trimming.
    #[error("Message must not be empty")]
    EmptyMessage,

    /// The stream layer could not be set up.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
