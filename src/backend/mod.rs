//! Network operations the engine depends on.
//!
//! Everything that leaves the process goes through [`BoardBackend`]. Failures
//! come back as `Err` values; the caller decides whether to retry (batches)
//! or just report (connection calls).

pub mod memory;

use crate::error::Result;
use crate::types::{BatchEntry, Card, Connection, ConnectionPatch};
use async_trait::async_trait;

pub use memory::MemoryBackend;

#[async_trait]
pub trait BoardBackend: Send + Sync {
    /// Apply a chunk of partial card updates. Each entry is applied
    /// atomically; callers keep chunks within the configured chunk size.
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<()>;

    async fn create_connection(&self, card_id: &str, connection: &Connection) -> Result<()>;

    /// Update one end of a connection. Only set fields are sent.
    async fn update_connection(
        &self,
        card_id: &str,
        connection_id: &str,
        patch: &ConnectionPatch,
    ) -> Result<()>;

    async fn delete_connection(&self, card_id: &str, connection_id: &str) -> Result<()>;

    async fn delete_card(&self, card_id: &str) -> Result<()>;

    /// Fetch the authoritative card list.
    async fn refresh_entities(&self) -> Result<Vec<Card>>;
}
