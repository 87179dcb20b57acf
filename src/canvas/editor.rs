//! Interactive connection editing.
//!
//! The editor is a small state machine fed with pointer and keyboard events.
//! It mutates the board directly for immediate feedback and hands back an
//! [`EditorEffect`] describing the network call the change needs. It never
//! talks to the backend itself.

use super::geometry::{snap_to_edges, Anchor, Rect, Snap};
use crate::board::Board;
use crate::config::CanvasConfig;
use crate::types::{Card, CardId, Connection, ConnectionPatch, ConnectionRef, Point};
use uuid::Uuid;

/// Which end of a connection a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleEnd {
    Start,
    End,
}

/// What the pointer went down on, as resolved by the view's hit testing.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    /// One of the four edge midpoints of a card. Only live on a selected card.
    Anchor { card_id: CardId, anchor: Anchor },
    /// Drag handle at one end of a connection.
    Handle { target: ConnectionRef, end: HandleEnd },
    /// The connection line itself.
    Connection(ConnectionRef),
    Card(CardId),
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorMode {
    Idle,
    Drawing {
        card_id: CardId,
        /// Absolute anchor position the line starts from.
        origin: Point,
        cursor: Snap,
    },
    DraggingEndpoint {
        target: ConnectionRef,
        end: HandleEnd,
        cursor: Snap,
    },
}

/// Network work produced by an edit, already applied locally.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEffect {
    CreateConnection {
        card_id: CardId,
        connection: Connection,
    },
    /// Only the field of the dragged end is set.
    UpdateConnection {
        target: ConnectionRef,
        patch: ConnectionPatch,
    },
    DeleteConnection(ConnectionRef),
    DeleteCard(CardId),
}

impl EditorEffect {
    pub fn card_id(&self) -> &str {
        match self {
            EditorEffect::CreateConnection { card_id, .. } => card_id,
            EditorEffect::UpdateConnection { target, .. } => &target.card_id,
            EditorEffect::DeleteConnection(target) => &target.card_id,
            EditorEffect::DeleteCard(card_id) => card_id,
        }
    }

    pub fn connection_id(&self) -> Option<&str> {
        match self {
            EditorEffect::CreateConnection { connection, .. } => Some(&connection.id),
            EditorEffect::UpdateConnection { target, .. } => Some(&target.connection_id),
            EditorEffect::DeleteConnection(target) => Some(&target.connection_id),
            EditorEffect::DeleteCard(_) => None,
        }
    }
}

/// The segment to draw while a session is active.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub start: Point,
    pub end: Point,
    /// Card the moving end is currently snapped to, for highlighting.
    pub snap_target: Option<CardId>,
}

#[derive(Debug, Clone)]
pub struct ConnectionEditor {
    config: CanvasConfig,
    mode: EditorMode,
    selected_card: Option<CardId>,
    selected_connection: Option<ConnectionRef>,
    /// Set while a press on a connection, handle or anchor is held, so the
    /// card underneath does not start dragging.
    press_captured: bool,
}

impl ConnectionEditor {
    pub fn new(config: CanvasConfig) -> Self {
        ConnectionEditor {
            config,
            mode: EditorMode::Idle,
            selected_card: None,
            selected_connection: None,
            press_captured: false,
        }
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn is_idle(&self) -> bool {
        self.mode == EditorMode::Idle
    }

    pub fn selected_card(&self) -> Option<&CardId> {
        self.selected_card.as_ref()
    }

    pub fn selected_connection(&self) -> Option<&ConnectionRef> {
        self.selected_connection.as_ref()
    }

    pub fn card_drag_allowed(&self) -> bool {
        !self.press_captured && self.is_idle()
    }

    pub fn pointer_down(&mut self, board: &Board, target: PointerTarget, at: Point) {
        if !self.is_idle() {
            tracing::debug!("[connections] pointer down during active session, cancelling it");
            self.cancel();
        }

        match target {
            PointerTarget::Anchor { card_id, anchor } => {
                let owner = board
                    .card(&card_id)
                    .filter(|_| self.selected_card.as_deref() == Some(card_id.as_str()));
                match owner {
                    Some(card) => {
                        let origin = anchor.point_on(&Rect::of_card(card));
                        self.mode = EditorMode::Drawing {
                            card_id,
                            origin,
                            cursor: raw(origin),
                        };
                        self.press_captured = true;
                    }
                    // Anchors are not shown on unselected cards.
                    None => self.select_card(card_id),
                }
            }
            PointerTarget::Handle { target, end } => {
                let Some(card) = board.card(&target.card_id) else {
                    tracing::warn!("[connections] handle on unknown card {}", target.card_id);
                    return;
                };
                let Some(connection) = card.connection(&target.connection_id) else {
                    tracing::warn!(
                        "[connections] handle on unknown connection {}",
                        target.connection_id
                    );
                    return;
                };
                let current = match end {
                    HandleEnd::Start => connection.start_point(card.position),
                    HandleEnd::End => connection.end_point,
                };
                tracing::debug!("[connections] dragging {:?} of {} from {:?}", end, target.connection_id, at);
                self.selected_connection = Some(target.clone());
                self.mode = EditorMode::DraggingEndpoint {
                    target,
                    end,
                    cursor: raw(current),
                };
                self.press_captured = true;
            }
            PointerTarget::Connection(target) => {
                self.selected_connection = Some(target);
                self.press_captured = true;
            }
            PointerTarget::Card(card_id) => self.select_card(card_id),
            PointerTarget::Background => {
                self.selected_card = None;
                self.selected_connection = None;
            }
        }
    }

    /// Track the pointer, snapping the moving end onto nearby card edges.
    pub fn pointer_move(&mut self, board: &Board, at: Point) -> Option<Preview> {
        let radius = self.config.snap_radius;
        let snapped = match &self.mode {
            EditorMode::Idle => return None,
            EditorMode::Drawing { card_id, .. } => snap_excluding(board, card_id, at, radius),
            EditorMode::DraggingEndpoint { target, .. } => {
                snap_excluding(board, &target.card_id, at, radius)
            }
        };
        match &mut self.mode {
            EditorMode::Drawing { cursor, .. } | EditorMode::DraggingEndpoint { cursor, .. } => {
                *cursor = snapped
            }
            EditorMode::Idle => {}
        }
        self.preview(board)
    }

    /// Finish the active session. The change is applied to `board` and the
    /// matching effect returned for persistence.
    pub fn pointer_up(&mut self, board: &mut Board) -> Option<EditorEffect> {
        self.press_captured = false;
        match std::mem::replace(&mut self.mode, EditorMode::Idle) {
            EditorMode::Idle => None,
            EditorMode::Drawing {
                card_id,
                origin,
                cursor,
            } => {
                let Some(owner) = board.card(&card_id) else {
                    tracing::warn!("[connections] card {} vanished while drawing, dropping line", card_id);
                    return None;
                };
                let connection = Connection {
                    id: Uuid::new_v4().to_string(),
                    start_offset: origin - owner.position,
                    end_point: cursor.point,
                };
                if let Err(e) = board.add_connection(&card_id, connection.clone()) {
                    tracing::warn!("[connections] could not add connection locally: {}", e);
                    return None;
                }
                tracing::info!(
                    "[connections] created {} on {} ending at ({}, {})",
                    connection.id,
                    card_id,
                    connection.end_point.x,
                    connection.end_point.y
                );
                Some(EditorEffect::CreateConnection {
                    card_id,
                    connection,
                })
            }
            EditorMode::DraggingEndpoint {
                target,
                end,
                cursor,
            } => {
                let Some(owner) = board.card(&target.card_id) else {
                    tracing::warn!("[connections] card {} vanished while dragging", target.card_id);
                    return None;
                };
                let Some(connection) = owner.connection(&target.connection_id) else {
                    tracing::warn!("[connections] connection {} vanished while dragging", target.connection_id);
                    return None;
                };
                let patch = match end {
                    HandleEnd::Start => {
                        let offset = cursor.point - owner.position;
                        if offset == connection.start_offset {
                            return None;
                        }
                        ConnectionPatch {
                            start_offset: Some(offset),
                            end_point: None,
                        }
                    }
                    HandleEnd::End => {
                        if cursor.point == connection.end_point {
                            return None;
                        }
                        ConnectionPatch {
                            start_offset: None,
                            end_point: Some(cursor.point),
                        }
                    }
                };
                if let Err(e) = board.update_connection(&target, &patch) {
                    tracing::warn!("[connections] could not update connection locally: {}", e);
                    return None;
                }
                Some(EditorEffect::UpdateConnection { target, patch })
            }
        }
    }

    /// Delete the selected connection, or else the selected card once
    /// `confirm` agrees.
    pub fn key_delete(
        &mut self,
        board: &mut Board,
        confirm: impl FnOnce(&Card) -> bool,
    ) -> Option<EditorEffect> {
        if let Some(target) = self.selected_connection.take() {
            return match board.remove_connection(&target) {
                Ok(_) => Some(EditorEffect::DeleteConnection(target)),
                Err(e) => {
                    tracing::warn!("[connections] nothing to delete: {}", e);
                    None
                }
            };
        }

        let card_id = self.selected_card.clone()?;
        let Some(card) = board.card(&card_id) else {
            self.selected_card = None;
            return None;
        };
        if !confirm(card) {
            return None;
        }
        board.remove_card(&card_id);
        self.selected_card = None;
        Some(EditorEffect::DeleteCard(card_id))
    }

    /// Abandon the active session without touching the board.
    pub fn cancel(&mut self) {
        self.mode = EditorMode::Idle;
        self.press_captured = false;
    }

    pub fn preview(&self, board: &Board) -> Option<Preview> {
        match &self.mode {
            EditorMode::Idle => None,
            EditorMode::Drawing { origin, cursor, .. } => Some(Preview {
                start: *origin,
                end: cursor.point,
                snap_target: cursor.target.clone(),
            }),
            EditorMode::DraggingEndpoint {
                target,
                end,
                cursor,
            } => {
                let owner = board.card(&target.card_id)?;
                let connection = owner.connection(&target.connection_id)?;
                let (start, stop) = match end {
                    HandleEnd::Start => (cursor.point, connection.end_point),
                    HandleEnd::End => (connection.start_point(owner.position), cursor.point),
                };
                Some(Preview {
                    start,
                    end: stop,
                    snap_target: cursor.target.clone(),
                })
            }
        }
    }

    fn select_card(&mut self, card_id: CardId) {
        self.selected_card = Some(card_id);
        self.selected_connection = None;
    }
}

impl Default for ConnectionEditor {
    fn default() -> Self {
        ConnectionEditor::new(CanvasConfig::default())
    }
}

fn raw(point: Point) -> Snap {
    Snap {
        point,
        target: None,
        distance: 0.0,
    }
}

/// Snap against every card on the board except the connection's owner.
fn snap_excluding(board: &Board, owner: &str, pointer: Point, radius: f64) -> Snap {
    let candidates = board
        .cards()
        .filter(|card| card.id != owner)
        .map(|card| (&card.id, Rect::of_card(card)));
    snap_to_edges(pointer, candidates, radius)
}
