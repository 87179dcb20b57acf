#![allow(dead_code)]

use corkboard::backend::MemoryBackend;
use corkboard::sync::{BatcherHandle, MutationBatcher, Notice, Notices};
use corkboard::{Board, Card, Point, SharedBoard, Size, SyncConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub fn card(id: &str, x: f64, y: f64, w: f64, h: f64) -> Card {
    Card::new(id, Point::new(x, y), Size::new(w, h))
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub board: SharedBoard,
    pub handle: BatcherHandle,
    pub task: JoinHandle<()>,
    pub notices: broadcast::Receiver<Notice>,
}

/// Batcher over a memory backend holding `cards`, with the local board
/// starting from the same cards.
pub fn spawn_batcher(config: SyncConfig, cards: Vec<Card>) -> Harness {
    let backend = Arc::new(MemoryBackend::with_cards(cards.clone()));
    let board = SharedBoard::new(Board::from_cards(cards));
    let notices = Notices::default();
    let rx = notices.subscribe();
    let (handle, task) = MutationBatcher::spawn(config, backend.clone(), board.clone(), notices);
    Harness {
        backend,
        board,
        handle,
        task,
        notices: rx,
    }
}

/// Everything raised so far.
pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
