//! One open board: the glue between UI events and the sync machinery.

use super::editor::{ConnectionEditor, EditorEffect, PointerTarget, Preview};
use super::position_sync::{CardPositionSync, ConnectionSegment};
use crate::backend::BoardBackend;
use crate::board::{Board, SharedBoard};
use crate::config::{CanvasConfig, SyncConfig};
use crate::error::Result;
use crate::sync::{BatcherHandle, ConnectionPersister, MutationBatcher, Notice, Notices};
use crate::types::{Card, CardId, CardPatch, Point, Size};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Routes pointer and keyboard events to the connection editor and card
/// position tracking, card edits to the batcher, and connection effects to
/// the persister.
///
/// Must be created inside a tokio runtime.
pub struct CanvasSession {
    board: SharedBoard,
    editor: ConnectionEditor,
    positions: CardPositionSync,
    batcher: BatcherHandle,
    batcher_task: JoinHandle<()>,
    persister: ConnectionPersister,
    notices: Notices,
}

impl CanvasSession {
    pub fn new(
        backend: Arc<dyn BoardBackend>,
        board: Board,
        sync: SyncConfig,
        canvas: CanvasConfig,
    ) -> Self {
        let board = SharedBoard::new(board);
        let notices = Notices::default();
        let (batcher, batcher_task) = MutationBatcher::spawn(
            sync,
            Arc::clone(&backend),
            board.clone(),
            notices.clone(),
        );

        CanvasSession {
            board,
            editor: ConnectionEditor::new(canvas),
            positions: CardPositionSync::new(),
            batcher,
            batcher_task,
            persister: ConnectionPersister::new(backend, notices.clone()),
            notices,
        }
    }

    /// Load the board from the backend and start a session on it.
    pub async fn open(
        backend: Arc<dyn BoardBackend>,
        sync: SyncConfig,
        canvas: CanvasConfig,
    ) -> Result<Self> {
        let cards = backend.refresh_entities().await?;
        tracing::info!("[session] opened board with {} cards", cards.len());
        Ok(Self::new(backend, Board::from_cards(cards), sync, canvas))
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    pub fn card(&self, id: &str) -> Option<Card> {
        self.board.read().card(id).cloned()
    }

    pub fn editor(&self) -> &ConnectionEditor {
        &self.editor
    }

    pub fn batcher(&self) -> &BatcherHandle {
        &self.batcher
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn pointer_down(&mut self, target: PointerTarget, at: Point) {
        self.editor.pointer_down(&self.board.read(), target, at);
    }

    pub fn pointer_move(&mut self, at: Point) -> Option<Preview> {
        self.editor.pointer_move(&self.board.read(), at)
    }

    /// Finish a draw or handle drag. Returns the persistence task if the
    /// release changed anything.
    pub fn pointer_up(&mut self) -> Option<JoinHandle<Result<()>>> {
        let effect = self.editor.pointer_up(&mut self.board.write())?;
        Some(self.persister.persist(effect))
    }

    pub fn key_delete(
        &mut self,
        confirm: impl FnOnce(&Card) -> bool,
    ) -> Option<JoinHandle<Result<()>>> {
        let effect = self.editor.key_delete(&mut self.board.write(), confirm)?;
        if let EditorEffect::DeleteCard(id) = &effect {
            if let Err(e) = self.batcher.forget(id.clone()) {
                tracing::warn!("[session] could not drop queued edits for {}: {}", id, e);
            }
        }
        Some(self.persister.persist(effect))
    }

    pub fn cancel(&mut self) {
        self.editor.cancel();
    }

    pub fn edit_card(&self, id: impl Into<CardId>, changes: CardPatch) -> Result<()> {
        self.batcher.enqueue(id, changes)
    }

    /// Live card drag. Ignored while the press belongs to a connection.
    pub fn drag_card(&mut self, id: &str, position: Point) -> Result<Vec<ConnectionSegment>> {
        if !self.editor.card_drag_allowed() {
            tracing::debug!("[session] card drag of {} suppressed by connection press", id);
            return Ok(Vec::new());
        }
        self.positions
            .drag_move(&mut self.board.write(), id, position)
    }

    pub fn drop_card(&mut self, id: &str) -> Result<()> {
        match self.positions.drag_stop(id) {
            Some(patch) => self.batcher.enqueue(id, patch),
            None => Ok(()),
        }
    }

    pub fn resize_card(&mut self, id: &str, dimensions: Size) -> Result<()> {
        self.positions
            .resize(&mut self.board.write(), id, dimensions)
    }

    pub fn finish_resize(&mut self, id: &str) -> Result<()> {
        match self.positions.resize_stop(id) {
            Some(patch) => self.batcher.enqueue(id, patch),
            None => Ok(()),
        }
    }

    pub fn retry_now(&self) -> Result<()> {
        self.batcher.retry_now()
    }

    /// Page unload: one best-effort flush, then wait for the batcher to stop.
    pub async fn unload(self) -> Result<()> {
        self.batcher.unload()?;
        if let Err(e) = self.batcher_task.await {
            tracing::error!("[session] batcher task failed: {}", e);
        }
        Ok(())
    }

    /// Teardown without flushing.
    pub async fn close(self) -> Result<()> {
        self.batcher.shutdown()?;
        if let Err(e) = self.batcher_task.await {
            tracing::error!("[session] batcher task failed: {}", e);
        }
        Ok(())
    }
}
