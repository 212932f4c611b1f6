//! User-facing notifications.
//!
//! A [`NotificationHub`] is a cloneable handle to one shared list of
//! notifications. Every change is broadcast to subscribers as the full list,
//! so a renderer only ever needs the latest value.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// How long non-error notifications stay visible by default.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

const CHANNEL_CAPACITY: usize = 64;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Operation succeeded.
    Success,
    /// Operation failed. Stays until dismissed.
    Error,
    /// Something needs attention.
    Warning,
    /// Informational.
    Info,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier, `toast-N`.
    pub id: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Text to show.
    pub message: String,
    /// Requested display duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl Notification {
    /// When the renderer should dismiss this notification on its own.
    ///
    /// Errors are never auto-dismissed, and neither is anything with a zero
    /// duration.
    #[must_use]
    pub fn auto_dismiss_after(&self) -> Option<Duration> {
        if self.kind == NotificationKind::Error {
            return None;
        }
        let duration = self.duration.unwrap_or(DEFAULT_DURATION);
        (!duration.is_zero()).then_some(duration)
    }
}

#[derive(Debug, Default)]
struct HubState {
    next_id: u64,
    items: Vec<Notification>,
}

/// Shared notification list with change subscriptions.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    state: Arc<Mutex<HubState>>,
    tx: broadcast::Sender<Vec<Notification>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            tx,
        }
    }

    /// Publish a success notification.
    pub fn success(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Success, message, None)
    }

    /// Publish an error notification.
    pub fn error(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Error, message, None)
    }

    /// Publish a warning notification.
    pub fn warning(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Warning, message, None)
    }

    /// Publish an info notification.
    pub fn info(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Info, message, None)
    }

    /// Publish a notification and return its id.
    pub fn push(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("toast-{}", state.next_id);
        state.items.push(Notification {
            id: id.clone(),
            kind,
            message: message.into(),
            duration,
        });
        debug!(%id, ?kind, "notification published");
        self.broadcast(&state.items);
        id
    }

    /// Remove a notification. Returns `false` if the id was unknown.
    pub fn dismiss(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.items.len();
        state.items.retain(|n| n.id != id);
        let removed = state.items.len() != before;
        if removed {
            self.broadcast(&state.items);
        }
        removed
    }

    /// Remove every notification.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if !state.items.is_empty() {
            state.items.clear();
            self.broadcast(&state.items);
        }
    }

    /// Current notifications, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notification> {
        self.state.lock().items.clone()
    }

    /// Subscribe to changes.
    ///
    /// The receiver gets the full list after each change; call
    /// [`snapshot`](Self::snapshot) for the value at subscription time.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Notification>> {
        self.tx.subscribe()
    }

    fn broadcast(&self, items: &[Notification]) {
        // No subscribers is fine.
        let _ = self.tx.send(items.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ids_increment() {
        let hub = NotificationHub::new();
        assert_eq!(hub.success("saved"), "toast-1");
        assert_eq!(hub.error("failed"), "toast-2");
        assert_eq!(hub.warning("careful"), "toast-3");
        assert_eq!(hub.info("fyi"), "toast-4");

        let kinds: Vec<_> = hub.snapshot().into_iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Success,
                NotificationKind::Error,
                NotificationKind::Warning,
                NotificationKind::Info,
            ]
        );
    }

    #[test]
    fn test_clones_share_state() {
        let hub = NotificationHub::new();
        let other = hub.clone();
        other.info("hello");
        assert_eq!(hub.snapshot().len(), 1);
    }

    #[test]
    fn test_dismiss() {
        let hub = NotificationHub::new();
        let first = hub.info("one");
        hub.info("two");

        assert!(hub.dismiss(&first));
        assert!(!hub.dismiss(&first));
        let remaining: Vec<_> = hub.snapshot().into_iter().map(|n| n.message).collect();
        assert_eq!(remaining, vec!["two".to_string()]);

        hub.clear();
        assert!(hub.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_receives_full_list() {
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe();

        let id = hub.error("backend down");
        let list = rx.recv().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].message, "backend down");

        hub.dismiss(&id);
        assert!(rx.recv().await.unwrap().is_empty());
    }

    #[test]
    fn test_auto_dismiss() {
        let hub = NotificationHub::new();
        hub.error("stays");
        hub.success("goes");
        hub.push(NotificationKind::Info, "sticky", Some(Duration::ZERO));
        hub.push(NotificationKind::Warning, "short", Some(Duration::from_secs(1)));

        let after: Vec<_> = hub
            .snapshot()
            .iter()
            .map(Notification::auto_dismiss_after)
            .collect();
        assert_eq!(
            after,
            vec![None, Some(DEFAULT_DURATION), None, Some(Duration::from_secs(1))]
        );
    }

    #[test]
    fn test_serialize_uses_type_key() {
        let n = Notification {
            id: "toast-1".into(),
            kind: NotificationKind::Warning,
            message: "careful".into(),
            duration: None,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "toast-1", "type": "warning", "message": "careful"})
        );
    }
}
