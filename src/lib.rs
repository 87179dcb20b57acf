//! # Corkboard
//!
//! Client-side engine for an interactive card canvas: partial card edits are
//! coalesced and sent to the server in periodic batches with bounded retry,
//! and user-drawn connections between cards snap to the nearest card edge
//! while they are dragged.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use corkboard::{CanvasConfig, CanvasSession, CardPatch, MemoryBackend, SyncConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> corkboard::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! let session = CanvasSession::open(backend, SyncConfig::from_env(), CanvasConfig::from_env()).await?;
//!
//! // Applied to the local board now, sent once the user pauses for 5s.
//! session.edit_card("c1", CardPatch::title("Groceries"))?;
//!
//! session.unload().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The HTTP backend lives in the companion `corkboard-remote` crate.

pub mod backend;
pub mod board;
pub mod canvas;
pub mod config;
pub mod error;
pub mod sync;
pub mod types;

pub use backend::{BoardBackend, MemoryBackend};
pub use board::{Board, SharedBoard};
pub use canvas::{
    snap_to_edges, Anchor, CanvasSession, CardPositionSync, ConnectionEditor, EditorEffect,
    PointerTarget, Rect,
};
pub use config::{CanvasConfig, SyncConfig};
pub use error::{CorkboardError, Result};
pub use sync::{BatcherHandle, MutationBatcher, Notice, NoticeKind, Notices, RetryController};
pub use types::*;
