use crate::types::{BatchEntry, CardId, CardPatch};
use indexmap::IndexMap;

/// Edits waiting for the next flush, at most one merged patch per card.
#[derive(Debug, Default)]
pub struct PendingEdits {
    entries: IndexMap<CardId, CardPatch>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CardPatch> {
        self.entries.get(id)
    }

    /// Merge a new edit; its set fields overwrite the queued ones.
    pub fn merge(&mut self, id: CardId, changes: CardPatch) {
        match self.entries.get_mut(&id) {
            Some(existing) => existing.merge(changes),
            None => {
                self.entries.insert(id, changes);
            }
        }
    }

    /// Drop a card's queued edit, keeping the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<CardPatch> {
        self.entries.shift_remove(id)
    }

    /// Put back edits from a failed send. Anything queued since then is newer
    /// and keeps precedence.
    pub fn restore(&mut self, unsent: Vec<BatchEntry>) {
        for entry in unsent {
            match self.entries.get_mut(&entry.id) {
                Some(newer) => newer.merge_under(entry.changes),
                None => {
                    self.entries.insert(entry.id, entry.changes);
                }
            }
        }
    }

    /// Take everything queued, leaving the set empty.
    pub fn take_job(&mut self) -> Vec<BatchEntry> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(id, changes)| BatchEntry { id, changes })
            .collect()
    }

    /// Queued edits as entries, without clearing them.
    pub fn entries(&self) -> Vec<BatchEntry> {
        self.entries
            .iter()
            .map(|(id, changes)| BatchEntry {
                id: id.clone(),
                changes: changes.clone(),
            })
            .collect()
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
