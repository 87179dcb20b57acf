use super::notice::{ConnectionAction, Notice, NoticeKind, Notices};
use crate::backend::BoardBackend;
use crate::canvas::EditorEffect;
use crate::error::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Sends connection and card-deletion effects to the backend.
///
/// Every effect is one call in its own task. Calls are not retried and the
/// local change is never rolled back; a failure only raises a notice.
#[derive(Clone)]
pub struct ConnectionPersister {
    backend: Arc<dyn BoardBackend>,
    notices: Notices,
}

impl ConnectionPersister {
    pub fn new(backend: Arc<dyn BoardBackend>, notices: Notices) -> Self {
        Self { backend, notices }
    }

    pub fn persist(&self, effect: EditorEffect) -> JoinHandle<Result<()>> {
        let backend = Arc::clone(&self.backend);
        let notices = self.notices.clone();

        tokio::spawn(async move {
            let result = execute(backend.as_ref(), &effect).await;
            if let Err(e) = &result {
                let action = action_of(&effect);
                tracing::warn!(
                    "[connections] {:?} failed for card {}: {}",
                    action,
                    effect.card_id(),
                    e
                );
                notices.raise(Notice::new(NoticeKind::ConnectionSaveFailed {
                    action,
                    card_id: effect.card_id().to_string(),
                    connection_id: effect.connection_id().map(str::to_string),
                    error: e.to_string(),
                }));
            }
            result
        })
    }
}

async fn execute(backend: &dyn BoardBackend, effect: &EditorEffect) -> Result<()> {
    match effect {
        EditorEffect::CreateConnection {
            card_id,
            connection,
        } => backend.create_connection(card_id, connection).await,
        EditorEffect::UpdateConnection { target, patch } => {
            backend
                .update_connection(&target.card_id, &target.connection_id, patch)
                .await
        }
        EditorEffect::DeleteConnection(target) => {
            backend
                .delete_connection(&target.card_id, &target.connection_id)
                .await
        }
        EditorEffect::DeleteCard(card_id) => backend.delete_card(card_id).await,
    }
}

fn action_of(effect: &EditorEffect) -> ConnectionAction {
    match effect {
        EditorEffect::CreateConnection { .. } => ConnectionAction::Create,
        EditorEffect::UpdateConnection { .. } => ConnectionAction::Update,
        EditorEffect::DeleteConnection(_) => ConnectionAction::Delete,
        EditorEffect::DeleteCard(_) => ConnectionAction::DeleteCard,
    }
}
