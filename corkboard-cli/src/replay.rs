use crate::script::{Script, ScriptEvent};
use corkboard::{
    BoardBackend, CanvasConfig, CanvasSession, Card, MemoryBackend, Point, Result, Size,
    SyncConfig,
};
use corkboard_remote::RemoteBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub enum ReplayBackend {
    Offline(Arc<MemoryBackend>),
    Remote(Arc<RemoteBackend>),
}

impl ReplayBackend {
    fn shared(&self) -> Arc<dyn BoardBackend> {
        match self {
            ReplayBackend::Offline(memory) => memory.clone(),
            ReplayBackend::Remote(remote) => remote.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub events: usize,
    pub rejected: usize,
    /// Server state after the final flush, if it could be fetched.
    pub cards: Option<Vec<Card>>,
}

/// Drive a canvas session through `script`, printing every notice to stdout
/// as a JSON line.
pub async fn run(script: Script, backend: ReplayBackend) -> Result<ReplaySummary> {
    let mut session = CanvasSession::open(
        backend.shared(),
        SyncConfig::from_env(),
        CanvasConfig::from_env(),
    )
    .await?;

    let mut notices = session.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => match serde_json::to_string(&notice) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("failed to encode notice: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("notice printer fell behind, {} notices lost", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut summary = ReplaySummary::default();
    let mut persisting: Vec<JoinHandle<Result<()>>> = Vec::new();

    for (idx, event) in script.events.into_iter().enumerate() {
        summary.events += 1;
        tracing::debug!("event {}: {:?}", idx, event);
        if let Err(e) = apply(&mut session, &backend, event, &mut persisting).await {
            tracing::warn!("event {} rejected: {}", idx, e);
            summary.rejected += 1;
        }
    }

    // Failures are already reported as notices.
    for handle in persisting {
        let _ = handle.await;
    }
    session.unload().await?;
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        tracing::warn!("notice printer did not finish");
    }

    match backend.shared().refresh_entities().await {
        Ok(cards) => summary.cards = Some(cards),
        Err(e) => tracing::warn!("could not fetch final board: {}", e),
    }
    Ok(summary)
}

async fn apply(
    session: &mut CanvasSession,
    backend: &ReplayBackend,
    event: ScriptEvent,
    persisting: &mut Vec<JoinHandle<Result<()>>>,
) -> Result<()> {
    match event {
        ScriptEvent::Edit { id, changes } => session.edit_card(id, changes)?,
        ScriptEvent::PointerDown { target, x, y } => {
            session.pointer_down(target.into(), Point::new(x, y))
        }
        ScriptEvent::PointerMove { x, y } => {
            session.pointer_move(Point::new(x, y));
        }
        ScriptEvent::PointerUp => persisting.extend(session.pointer_up()),
        ScriptEvent::Drag { id, x, y } => {
            session.drag_card(&id, Point::new(x, y))?;
        }
        ScriptEvent::Drop { id } => session.drop_card(&id)?,
        ScriptEvent::Resize { id, width, height } => {
            session.resize_card(&id, Size::new(width, height))?
        }
        ScriptEvent::ResizeStop { id } => session.finish_resize(&id)?,
        ScriptEvent::Delete { confirm } => persisting.extend(session.key_delete(|_| confirm)),
        ScriptEvent::Cancel => session.cancel(),
        ScriptEvent::Retry => session.retry_now()?,
        ScriptEvent::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
        ScriptEvent::Offline { value } => match backend {
            ReplayBackend::Offline(memory) => memory.set_offline(value),
            ReplayBackend::Remote(_) => {
                tracing::warn!("offline event ignored against a remote backend")
            }
        },
    }
    Ok(())
}
