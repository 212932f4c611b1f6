//! Tracing subscriber setup for applications embedding the client.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither the config nor `RUST_LOG` says otherwise.
pub const DEFAULT_FILTER: &str = "supportdesk=info";

/// Errors from [`init_tracing`].
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives, e.g. `supportdesk_streaming=debug`.
    pub filter: String,
    /// Prefer `RUST_LOG` over [`filter`](Self::filter) when it is set.
    pub use_env: bool,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Include the event target.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            use_env: true,
            json: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Ignore `RUST_LOG`.
    #[must_use]
    pub fn ignore_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Switch to JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Build the filter this config resolves to.
    ///
    /// # Errors
    ///
    /// Returns an error if [`filter`](Self::filter) is not a valid directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        if self.use_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        Ok(EnvFilter::try_new(&self.filter)?)
    }
}

/// Install a global `fmt` subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))
}
