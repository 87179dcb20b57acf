//! In-process backend.
//!
//! Holds cards in memory and records every call with the (tokio) time it was
//! made, so tests can assert on batch contents and timer behaviour. Failures
//! and latency can be injected per operation. The CLI uses it for offline
//! replays.

use super::BoardBackend;
use crate::error::{CorkboardError, Result};
use crate::types::{BatchEntry, Card, CardId, Connection, ConnectionPatch};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SendBatch,
    CreateConnection,
    UpdateConnection,
    DeleteConnection,
    DeleteCard,
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SendBatch(Vec<BatchEntry>),
    CreateConnection {
        card_id: CardId,
        connection: Connection,
    },
    UpdateConnection {
        card_id: CardId,
        connection_id: String,
        patch: ConnectionPatch,
    },
    DeleteConnection {
        card_id: CardId,
        connection_id: String,
    },
    DeleteCard(CardId),
    Refresh,
}

impl BackendCall {
    pub fn operation(&self) -> Operation {
        match self {
            BackendCall::SendBatch(_) => Operation::SendBatch,
            BackendCall::CreateConnection { .. } => Operation::CreateConnection,
            BackendCall::UpdateConnection { .. } => Operation::UpdateConnection,
            BackendCall::DeleteConnection { .. } => Operation::DeleteConnection,
            BackendCall::DeleteCard(_) => Operation::DeleteCard,
            BackendCall::Refresh => Operation::Refresh,
        }
    }
}

/// A recorded call and when it started.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: BackendCall,
    pub at: Instant,
    /// Whether the call was made to fail.
    pub failed: bool,
}

#[derive(Default)]
struct MemoryState {
    cards: IndexMap<CardId, Card>,
    calls: Vec<RecordedCall>,
    fail_next: HashMap<Operation, u32>,
    offline: bool,
    latency: Duration,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let backend = Self::new();
        backend.lock().cards = cards.into_iter().map(|c| (c.id.clone(), c)).collect();
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `times` calls of `op` fail with a network error.
    pub fn fail_next(&self, op: Operation, times: u32) {
        self.lock().fail_next.insert(op, times);
    }

    /// While offline every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay every call by `latency` before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Operation) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.call.operation() == op)
            .cloned()
            .collect()
    }

    /// Entries of every `send_batch` call in order.
    pub fn sent_batches(&self) -> Vec<Vec<BatchEntry>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match &c.call {
                BackendCall::SendBatch(entries) => Some(entries.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn card(&self, id: &str) -> Option<Card> {
        self.lock().cards.get(id).cloned()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.lock().cards.values().cloned().collect()
    }

    pub fn insert_card(&self, card: Card) {
        self.lock().cards.insert(card.id.clone(), card);
    }

    /// Record the call and decide whether it fails. Returns the latency to
    /// wait before resolving.
    fn begin(&self, call: BackendCall) -> (bool, Duration) {
        let mut state = self.lock();
        let op = call.operation();
        let mut failed = state.offline;
        if let Some(remaining) = state.fail_next.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                failed = true;
            }
        }
        state.calls.push(RecordedCall {
            call,
            at: Instant::now(),
            failed,
        });
        (failed, state.latency)
    }

    async fn call<T>(
        &self,
        call: BackendCall,
        apply: impl FnOnce(&mut MemoryState) -> Result<T>,
    ) -> Result<T> {
        let op = call.operation();
        let (failed, latency) = self.begin(call);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if failed {
            return Err(CorkboardError::Network(format!(
                "{:?} failed (simulated)",
                op
            )));
        }
        apply(&mut self.lock())
    }
}

fn card_mut<'a>(state: &'a mut MemoryState, card_id: &str) -> Result<&'a mut Card> {
    state
        .cards
        .get_mut(card_id)
        .ok_or_else(|| CorkboardError::CardNotFound(card_id.to_string()))
}

#[async_trait]
impl BoardBackend for MemoryBackend {
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<()> {
        self.call(BackendCall::SendBatch(entries.to_vec()), |state| {
            for entry in entries {
                if let Some(card) = state.cards.get_mut(&entry.id) {
                    entry.changes.apply_to(card);
                }
            }
            Ok(())
        })
        .await
    }

    async fn create_connection(&self, card_id: &str, connection: &Connection) -> Result<()> {
        let call = BackendCall::CreateConnection {
            card_id: card_id.to_string(),
            connection: connection.clone(),
        };
        self.call(call, |state| {
            card_mut(state, card_id)?.connections.push(connection.clone());
            Ok(())
        })
        .await
    }

    async fn update_connection(
        &self,
        card_id: &str,
        connection_id: &str,
        patch: &ConnectionPatch,
    ) -> Result<()> {
        let call = BackendCall::UpdateConnection {
            card_id: card_id.to_string(),
            connection_id: connection_id.to_string(),
            patch: *patch,
        };
        self.call(call, |state| {
            let connection = card_mut(state, card_id)?
                .connection_mut(connection_id)
                .ok_or_else(|| CorkboardError::ConnectionNotFound {
                    card_id: card_id.to_string(),
                    connection_id: connection_id.to_string(),
                })?;
            patch.apply_to(connection);
            Ok(())
        })
        .await
    }

    async fn delete_connection(&self, card_id: &str, connection_id: &str) -> Result<()> {
        let call = BackendCall::DeleteConnection {
            card_id: card_id.to_string(),
            connection_id: connection_id.to_string(),
        };
        self.call(call, |state| {
            card_mut(state, card_id)?
                .connections
                .retain(|c| c.id != connection_id);
            Ok(())
        })
        .await
    }

    async fn delete_card(&self, card_id: &str) -> Result<()> {
        self.call(BackendCall::DeleteCard(card_id.to_string()), |state| {
            state.cards.shift_remove(card_id);
            Ok(())
        })
        .await
    }

    async fn refresh_entities(&self) -> Result<Vec<Card>> {
        self.call(BackendCall::Refresh, |state| {
            Ok(state.cards.values().cloned().collect())
        })
        .await
    }
}
