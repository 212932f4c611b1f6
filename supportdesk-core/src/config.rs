//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::{CoreError, Result};

/// Environment variable holding the backend base URL.
pub const ENV_API_BASE_URL: &str = "SUPPORTDESK_API_BASE_URL";
/// Environment variable holding the default user ID.
pub const ENV_USER_ID: &str = "SUPPORTDESK_USER_ID";
/// Environment variable holding the stream idle timeout, in seconds.
pub const ENV_STREAM_IDLE_TIMEOUT_SECS: &str = "SUPPORTDESK_STREAM_IDLE_TIMEOUT_SECS";

/// Default backend base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
/// Default user ID for demo deployments.
pub const DEFAULT_USER_ID: &str = "demo_user";

/// Backend endpoint paths.
pub mod endpoints {
    /// Streaming chat endpoint (POST, SSE response).
    pub const CHAT_STREAM: &str = "/chat/stream";
    /// Health check.
    pub const HEALTH: &str = "/health";
    /// Multi-file knowledge upload.
    pub const KNOWLEDGE_UPLOAD: &str = "/knowledge/upload-multiple";
    /// Delete every knowledge document.
    pub const KNOWLEDGE_DELETE_ALL: &str = "/knowledge/all";
    /// Resolve a user from a persona.
    pub const USERS_BY_PERSONA: &str = "/users/by-persona";

    /// Threads belonging to a user.
    #[must_use]
    pub fn threads(user_id: &str) -> String {
        format!("/threads/{user_id}")
    }

    /// Messages of a conversation.
    #[must_use]
    pub fn messages(conversation_id: &str) -> String {
        format!("/threads/{conversation_id}/messages")
    }

    /// Knowledge documents of a user.
    #[must_use]
    pub fn knowledge_list(user_id: &str) -> String {
        format!("/knowledge/{user_id}")
    }

    /// A single knowledge file.
    #[must_use]
    pub fn knowledge_file(file_id: &str) -> String {
        format!("/knowledge/file/{file_id}")
    }

    /// Memories of a user.
    #[must_use]
    pub fn memory_list(user_id: &str) -> String {
        format!("/memory/{user_id}")
    }

    /// A single memory.
    #[must_use]
    pub fn memory(memory_id: &str) -> String {
        format!("/memory/{memory_id}")
    }
}

/// Configuration shared by the streaming client and the chat store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL. `None` means [`DEFAULT_API_BASE_URL`].
    pub base_url: Option<Url>,
    /// User the client acts as until a persona resolves another one.
    pub user_id: String,
    /// Abort a stream when no bytes arrive for this long.
    pub stream_idle_timeout: Option<Duration>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_id: DEFAULT_USER_ID.to_string(),
            stream_idle_timeout: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `SUPPORTDESK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Unset or blank keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_BASE_URL) {
            config.base_url = Some(Url::parse(url.trim())?);
        }
        if let Some(user_id) = get(ENV_USER_ID) {
            config.user_id = user_id.trim().to_string();
        }
        if let Some(secs) = get(ENV_STREAM_IDLE_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| CoreError::invalid_value(ENV_STREAM_IDLE_TIMEOUT_SECS, secs.clone()))?;
            config.stream_idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set the user ID.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the stream idle timeout.
    #[must_use]
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve an endpoint path against the base URL.
    ///
    /// Any path already on the base URL is preserved, so a backend mounted at
    /// `https://host/api` resolves `/chat/stream` to `https://host/api/chat/stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .map_or(DEFAULT_API_BASE_URL, Url::as_str)
            .trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// URL of the streaming chat endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn chat_stream_url(&self) -> Result<Url> {
        self.endpoint(endpoints::CHAT_STREAM)
    }
}
