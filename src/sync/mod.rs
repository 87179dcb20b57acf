//! Getting local edits to the server.

pub mod batcher;
pub mod connections;
pub mod notice;
pub mod pending;
pub mod retry;

pub use batcher::{BatcherHandle, BatcherSnapshot, FlushTrigger, MutationBatcher};
pub use connections::ConnectionPersister;
pub use notice::{ConnectionAction, Notice, NoticeKind, NoticeLifetime, Notices};
pub use pending::PendingEdits;
pub use retry::{RetryController, RetryDecision};
