//! Local display state for the canvas.
//!
//! The board is what the UI renders. Edits land here optimistically before
//! the server has confirmed them, and every refresh from the server replaces
//! it wholesale with the authoritative card list.

use crate::error::{CorkboardError, Result};
use crate::types::{
    BatchEntry, Card, CardId, CardPatch, Connection, ConnectionPatch, ConnectionRef, Point,
};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cards keyed by id, kept in server order. Order matters: it is the
/// tie-break order for edge snapping.
#[derive(Debug, Clone, Default)]
pub struct Board {
    cards: IndexMap<CardId, Card>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut board = Board::new();
        board.replace_all(cards);
        board
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.get_mut(id)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    pub fn insert_card(&mut self, card: Card) {
        self.cards.insert(card.id.clone(), card);
    }

    /// Remove a card together with the connections it owns.
    pub fn remove_card(&mut self, id: &str) -> Option<Card> {
        self.cards.shift_remove(id)
    }

    /// Replace the whole board with an authoritative card list.
    pub fn replace_all(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards = cards.into_iter().map(|c| (c.id.clone(), c)).collect();
    }

    /// Apply a partial update. Returns false if the card is not on the board;
    /// the edit is still worth sending since the board may simply be stale.
    pub fn apply_patch(&mut self, id: &str, patch: &CardPatch) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                patch.apply_to(card);
                true
            }
            None => false,
        }
    }

    /// Re-apply queued edits on top of a fresh server snapshot.
    pub fn apply_entries<'a>(&mut self, entries: impl IntoIterator<Item = &'a BatchEntry>) {
        for entry in entries {
            self.apply_patch(&entry.id, &entry.changes);
        }
    }

    pub fn set_position(&mut self, id: &str, position: Point) -> Result<&Card> {
        let card = self
            .cards
            .get_mut(id)
            .ok_or_else(|| CorkboardError::CardNotFound(id.to_string()))?;
        card.position = position;
        Ok(card)
    }

    pub fn connection(&self, target: &ConnectionRef) -> Option<&Connection> {
        self.cards
            .get(&target.card_id)
            .and_then(|card| card.connection(&target.connection_id))
    }

    pub fn add_connection(&mut self, card_id: &str, connection: Connection) -> Result<()> {
        let card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| CorkboardError::CardNotFound(card_id.to_string()))?;
        card.connections.push(connection);
        Ok(())
    }

    pub fn update_connection(
        &mut self,
        target: &ConnectionRef,
        patch: &ConnectionPatch,
    ) -> Result<()> {
        let connection = self.connection_mut(target)?;
        patch.apply_to(connection);
        Ok(())
    }

    pub fn remove_connection(&mut self, target: &ConnectionRef) -> Result<Connection> {
        let card = self
            .cards
            .get_mut(&target.card_id)
            .ok_or_else(|| CorkboardError::CardNotFound(target.card_id.clone()))?;
        let idx = card
            .connections
            .iter()
            .position(|c| c.id == target.connection_id)
            .ok_or_else(|| not_found(target))?;
        Ok(card.connections.remove(idx))
    }

    fn connection_mut(&mut self, target: &ConnectionRef) -> Result<&mut Connection> {
        self.cards
            .get_mut(&target.card_id)
            .ok_or_else(|| CorkboardError::CardNotFound(target.card_id.clone()))?
            .connection_mut(&target.connection_id)
            .ok_or_else(|| not_found(target))
    }
}

fn not_found(target: &ConnectionRef) -> CorkboardError {
    CorkboardError::ConnectionNotFound {
        card_id: target.card_id.clone(),
        connection_id: target.connection_id.clone(),
    }
}

/// Board shared between the UI side and the batcher task.
///
/// Critical sections are short and never span an await. A panic while the
/// lock is held leaves the board usable: the next refresh overwrites it.
#[derive(Debug, Clone, Default)]
pub struct SharedBoard(Arc<RwLock<Board>>);

impl SharedBoard {
    pub fn new(board: Board) -> Self {
        SharedBoard(Arc::new(RwLock::new(board)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Board> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Board> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Size;

    fn card(id: &str, x: f64, y: f64) -> Card {
        Card::new(id, Point::new(x, y), Size::new(100.0, 50.0))
    }

    #[test]
    fn test_replace_all_keeps_server_order() {
        let board = Board::from_cards(vec![card("b", 0.0, 0.0), card("a", 1.0, 1.0)]);
        let ids: Vec<_> = board.cards().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_apply_patch_on_missing_card() {
        let mut board = Board::new();
        assert!(!board.apply_patch("ghost", &CardPatch::title("x")));
    }

    #[test]
    fn test_connection_lifecycle() {
        let mut board = Board::from_cards(vec![card("a", 0.0, 0.0)]);
        board
            .add_connection(
                "a",
                Connection {
                    id: "k".into(),
                    start_offset: Point::new(50.0, 0.0),
                    end_point: Point::new(300.0, 300.0),
                },
            )
            .unwrap();

        let target = ConnectionRef::new("a", "k");
        board
            .update_connection(
                &target,
                &ConnectionPatch {
                    end_point: Some(Point::new(1.0, 2.0)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            board.connection(&target).unwrap().end_point,
            Point::new(1.0, 2.0)
        );

        board.remove_connection(&target).unwrap();
        assert!(matches!(
            board.remove_connection(&target),
            Err(CorkboardError::ConnectionNotFound { .. })
        ));
    }
}
