use crate::types::{CardId, ConnectionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// How long a notice stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLifetime {
    AutoDismiss,
    /// Stays until the user closes it or the condition clears.
    UntilDismissed,
    /// Error state that stays until the user acts.
    Persistent,
}

/// Which connection call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionAction {
    Create,
    Update,
    Delete,
    DeleteCard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeKind {
    /// A flush failed and a retry is scheduled.
    SyncFailed {
        attempt: u32,
        retry_in_ms: u64,
        error: String,
    },
    /// Automatic retries ran out; the batch is dropped.
    SyncAbandoned {
        attempts: u32,
        dropped_edits: usize,
        error: String,
    },
    /// A flush succeeded after earlier failures.
    SyncRestored,
    /// A single connection or card call failed. Not retried, local state kept.
    ConnectionSaveFailed {
        action: ConnectionAction,
        card_id: CardId,
        connection_id: Option<ConnectionId>,
        error: String,
    },
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(flatten)]
    pub kind: NoticeKind,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(kind: NoticeKind) -> Self {
        Notice {
            kind,
            raised_at: Utc::now(),
        }
    }

    pub fn sync_failed(attempt: u32, retry_in: Duration, error: impl ToString) -> Self {
        Notice::new(NoticeKind::SyncFailed {
            attempt,
            retry_in_ms: retry_in.as_millis() as u64,
            error: error.to_string(),
        })
    }

    pub fn lifetime(&self) -> NoticeLifetime {
        match self.kind {
            NoticeKind::SyncFailed { .. } => NoticeLifetime::UntilDismissed,
            NoticeKind::SyncAbandoned { .. } => NoticeLifetime::Persistent,
            NoticeKind::SyncRestored => NoticeLifetime::AutoDismiss,
            NoticeKind::ConnectionSaveFailed { .. } => NoticeLifetime::UntilDismissed,
        }
    }

    /// Whether the notice carries a "retry now" action, wired to
    /// `BatcherHandle::retry_now`.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self.kind,
            NoticeKind::SyncFailed { .. } | NoticeKind::SyncAbandoned { .. }
        )
    }

    pub fn message(&self) -> String {
        match &self.kind {
            NoticeKind::SyncFailed {
                attempt,
                retry_in_ms,
                error,
            } => format!(
                "Saving failed ({}), retry {} in {:.1}s",
                error,
                attempt,
                *retry_in_ms as f64 / 1000.0
            ),
            NoticeKind::SyncAbandoned {
                attempts,
                dropped_edits,
                error,
            } => format!(
                "Could not save {} card edit(s) after {} attempts ({}). Reloaded from server.",
                dropped_edits, attempts, error
            ),
            NoticeKind::SyncRestored => "All changes saved".to_string(),
            NoticeKind::ConnectionSaveFailed { action, error, .. } => {
                let what = match action {
                    ConnectionAction::Create => "create connection",
                    ConnectionAction::Update => "update connection",
                    ConnectionAction::Delete => "delete connection",
                    ConnectionAction::DeleteCard => "delete card",
                };
                format!("Failed to {}: {}", what, error)
            }
        }
    }
}

/// Fan-out of notices to any number of UI subscribers.
#[derive(Debug, Clone)]
pub struct Notices {
    tx: broadcast::Sender<Notice>,
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Notices { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn raise(&self, notice: Notice) {
        tracing::debug!("[notice] {}", notice.message());
        // No subscribers is fine: nobody is looking at the screen.
        let _ = self.tx.send(notice);
    }
}

impl Default for Notices {
    fn default() -> Self {
        Notices::new(64)
    }
}
