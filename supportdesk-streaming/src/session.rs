//! Per-stream session state and cancellation handles.
//!
//! A session moves from `Active` to exactly one of `Completed`, `Failed`,
//! or `Cancelled`. The transition is a single compare-and-swap, which is what
//! makes the terminal callbacks and cancellation mutually exclusive.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Connecting or streaming.
    Active = 0,
    /// Ended normally; `on_complete` fired.
    Completed = 1,
    /// Ended abnormally; `on_error` fired.
    Failed = 2,
    /// Cancelled by the caller; no terminal callback fired.
    Cancelled = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Completed,
            2 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub(crate) struct Session {
    id: String,
    state: AtomicU8,
    token: CancellationToken,
}

impl Session {
    pub(crate) fn new(id: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: AtomicU8::new(SessionState::Active as u8),
            token: CancellationToken::new(),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Move from `Active` to `to`. Returns false if the session already ended.
    pub(crate) fn finish(&self, to: SessionState) -> bool {
        self.state
            .compare_exchange(
                SessionState::Active as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Clonable handle that cancels a stream session.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    session: Arc<Session>,
}

impl CancelHandle {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Cancel the session and abort its transport.
    ///
    /// Returns `true` if this call cancelled an active session. Cancelling a
    /// session that already ended, or cancelling twice, does nothing.
    pub fn cancel(&self) -> bool {
        if !self.session.finish(SessionState::Cancelled) {
            return false;
        }
        tracing::debug!(session_id = %self.session.id(), "chat stream cancelled");
        self.session.token().cancel();
        true
    }

    /// Current state of the session.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the session is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Session ID used in log output.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session.id()
    }
}

/// Handle to a running stream session, returned by
/// [`ChatStreamController::open`](crate::ChatStreamController::open).
///
/// Dropping the handle does not cancel the session.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub(crate) fn new(session: Arc<Session>, task: JoinHandle<()>) -> Self {
        Self {
            cancel: CancelHandle::new(session),
            task,
        }
    }

    /// Cancel the session. See [`CancelHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// A clonable cancel handle for storing elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current state of the session.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.cancel.state()
    }

    /// Whether the session is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_active()
    }

    /// Session ID used in log output.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.cancel.session_id()
    }

    /// Wait for the decode loop to exit and return the final state.
    pub async fn finished(self) -> SessionState {
        if let Err(e) = self.task.await {
            tracing::error!(session_id = %self.cancel.session_id(), error = %e, "chat stream task panicked");
        }
        self.cancel.state()
    }
}
