//! Keeps connection starts glued to their cards while the cards move.
//!
//! Live drag and resize updates only touch the local board. The final
//! value is turned into a [`CardPatch`] at drag/resize stop for the batcher.

use crate::board::Board;
use crate::error::{CorkboardError, Result};
use crate::types::{Card, CardId, CardPatch, ConnectionId, Point, Size};
use std::collections::HashMap;

/// A connection as currently drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSegment {
    pub connection_id: ConnectionId,
    pub start: Point,
    pub end: Point,
}

/// Absolute segments for every connection `card` owns. End points are used
/// as stored; they never follow a card.
pub fn segments_for(card: &Card) -> Vec<ConnectionSegment> {
    card.connections
        .iter()
        .map(|c| ConnectionSegment {
            connection_id: c.id.clone(),
            start: c.start_point(card.position),
            end: c.end_point,
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Gesture<T> {
    origin: T,
    current: T,
}

#[derive(Debug, Default)]
pub struct CardPositionSync {
    drags: HashMap<CardId, Gesture<Point>>,
    resizes: HashMap<CardId, Gesture<Size>>,
}

impl CardPositionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self, id: &str) -> bool {
        self.drags.contains_key(id)
    }

    /// Move a card and return its connections at the new position.
    pub fn drag_move(
        &mut self,
        board: &mut Board,
        id: &str,
        position: Point,
    ) -> Result<Vec<ConnectionSegment>> {
        let before = board
            .card(id)
            .map(|card| card.position)
            .ok_or_else(|| CorkboardError::CardNotFound(id.to_string()))?;
        self.drags
            .entry(id.to_string())
            .and_modify(|g| g.current = position)
            .or_insert(Gesture {
                origin: before,
                current: position,
            });
        let card = board.set_position(id, position)?;
        Ok(segments_for(card))
    }

    /// End a drag. Returns the position edit to persist, or `None` when the
    /// card ended where it started.
    pub fn drag_stop(&mut self, id: &str) -> Option<CardPatch> {
        let gesture = self.drags.remove(id)?;
        (gesture.current != gesture.origin).then(|| CardPatch::position(gesture.current))
    }

    pub fn resize(&mut self, board: &mut Board, id: &str, dimensions: Size) -> Result<()> {
        let card = board
            .card_mut(id)
            .ok_or_else(|| CorkboardError::CardNotFound(id.to_string()))?;
        let before = card.dimensions;
        card.dimensions = dimensions;
        self.resizes
            .entry(id.to_string())
            .and_modify(|g| g.current = dimensions)
            .or_insert(Gesture {
                origin: before,
                current: dimensions,
            });
        Ok(())
    }

    pub fn resize_stop(&mut self, id: &str) -> Option<CardPatch> {
        let gesture = self.resizes.remove(id)?;
        (gesture.current != gesture.origin).then(|| CardPatch::dimensions(gesture.current))
    }
}
