//! ID and clock helpers.
//!
//! Messages created locally before the backend has acknowledged them carry
//! temporary IDs; conversation IDs are always assigned by the backend.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Prefix shared by all locally generated message IDs.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Generate a temporary ID for an optimistic user message.
///
/// # Example
///
/// ```rust
/// use supportdesk_core::identifier::generate_temp_message_id;
///
/// let id = generate_temp_message_id();
/// assert!(id.starts_with("temp-"));
/// ```
#[must_use]
pub fn generate_temp_message_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4().simple())
}

/// Generate a temporary ID for the assistant placeholder message.
#[must_use]
pub fn generate_temp_assistant_id() -> String {
    format!("{TEMP_ID_PREFIX}assistant-{}", Uuid::new_v4().simple())
}

/// Generate a short ID suitable for log correlation.
///
/// Returns the first 8 characters of a UUID.
#[must_use]
pub fn generate_short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Get the current UTC timestamp.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Backend-assigned conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
