//! Replay script format.
//!
//! ```json
//! {
//!   "cards": [{"id": "a", "position": {"x": 0, "y": 0}, "dimensions": {"width": 100, "height": 50}}],
//!   "events": [
//!     {"event": "edit", "id": "a", "changes": {"title": "Hello"}},
//!     {"event": "wait", "ms": 6000}
//!   ]
//! }
//! ```
//!
//! `cards` seeds the offline backend and is ignored against a remote API.

use corkboard::canvas::HandleEnd;
use corkboard::{Anchor, Card, CardId, CardPatch, ConnectionId, ConnectionRef, PointerTarget};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub cards: Vec<Card>,
    pub events: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptTarget {
    Anchor { card: CardId, anchor: Anchor },
    Handle {
        card: CardId,
        connection: ConnectionId,
        end: HandleEnd,
    },
    Connection { card: CardId, connection: ConnectionId },
    Card { card: CardId },
    Background,
}

impl From<ScriptTarget> for PointerTarget {
    fn from(target: ScriptTarget) -> Self {
        match target {
            ScriptTarget::Anchor { card, anchor } => PointerTarget::Anchor {
                card_id: card,
                anchor,
            },
            ScriptTarget::Handle {
                card,
                connection,
                end,
            } => PointerTarget::Handle {
                target: ConnectionRef::new(card, connection),
                end,
            },
            ScriptTarget::Connection { card, connection } => {
                PointerTarget::Connection(ConnectionRef::new(card, connection))
            }
            ScriptTarget::Card { card } => PointerTarget::Card(card),
            ScriptTarget::Background => PointerTarget::Background,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Edit { id: CardId, changes: CardPatch },
    PointerDown { target: ScriptTarget, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Drag { id: CardId, x: f64, y: f64 },
    Drop { id: CardId },
    Resize { id: CardId, width: f64, height: f64 },
    ResizeStop { id: CardId },
    /// Delete key. `confirm` answers the card deletion prompt.
    Delete {
        #[serde(default)]
        confirm: bool,
    },
    Cancel,
    Retry,
    Wait { ms: u64 },
    /// Take the offline backend on or off line.
    Offline { value: bool },
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }
}
