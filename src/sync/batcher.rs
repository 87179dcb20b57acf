//! Edit batching for card updates.
//!
//! UI code pushes partial card edits through a [`BatcherHandle`]. A single
//! actor task merges them per card and sends them in chunks once the user
//! pauses (interval timer, reset by every edit) or after a hard upper bound
//! (max-delay timer, started by the first edit and never reset). At most one
//! flush is in flight; edits that arrive meanwhile wait for the next one.
//! Failed flushes are retried by [`RetryController`] policy.

use super::notice::{Notice, NoticeKind, Notices};
use super::pending::PendingEdits;
use super::retry::{RetryController, RetryDecision};
use crate::backend::BoardBackend;
use crate::board::SharedBoard;
use crate::config::SyncConfig;
use crate::error::{CorkboardError, Result};
use crate::types::{BatchEntry, Card, CardId, CardPatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, timeout_at, Instant};

/// What started a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Interval,
    MaxDelay,
    Retry,
    Manual,
    Unload,
}

enum BatchCommand {
    Enqueue { id: CardId, changes: CardPatch },
    Flush(FlushTrigger),
    Snapshot(oneshot::Sender<BatcherSnapshot>),
    Forget(CardId),
    Unload,
    Shutdown,
}

/// Point-in-time view of the batcher, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct BatcherSnapshot {
    pub pending: usize,
    pub flushing: bool,
    pub retry_count: u32,
    pub current_backoff: Duration,
    pub interval_armed: bool,
    pub max_delay_armed: bool,
    pub retry_armed: bool,
}

/// Cheap, cloneable entry point to the batcher.
#[derive(Clone)]
pub struct BatcherHandle {
    tx: mpsc::Sender<BatchCommand>,
    board: SharedBoard,
    capacity: usize,
}

impl BatcherHandle {
    /// Queue a partial card edit and apply it to the local board right away.
    ///
    /// Edits without a card id are dropped with a warning and never queued.
    pub fn enqueue(&self, id: impl Into<CardId>, changes: CardPatch) -> Result<()> {
        let id = id.into();
        if id.trim().is_empty() {
            tracing::warn!("[batch] dropping edit with empty card id: {:?}", changes);
            return Err(CorkboardError::InvalidEntity(
                "card edit without an id".to_string(),
            ));
        }
        if changes.is_empty() {
            return Ok(());
        }

        let optimistic = changes.clone();
        self.send(BatchCommand::Enqueue {
            id: id.clone(),
            changes,
        })?;
        if !self.board.write().apply_patch(&id, &optimistic) {
            tracing::debug!("[batch] card {} not on board, edit queued anyway", id);
        }
        Ok(())
    }

    /// Flush immediately, e.g. from the "retry now" action of a notice.
    /// Does nothing while another flush is running.
    pub fn retry_now(&self) -> Result<()> {
        self.send(BatchCommand::Flush(FlushTrigger::Manual))
    }

    /// Drop whatever is queued for a card that no longer exists.
    pub fn forget(&self, id: impl Into<CardId>) -> Result<()> {
        self.send(BatchCommand::Forget(id.into()))
    }

    /// Page is going away: stop timers and make one best-effort flush.
    pub fn unload(&self) -> Result<()> {
        self.send(BatchCommand::Unload)
    }

    /// Tear down without flushing. Queued edits are dropped.
    pub fn shutdown(&self) -> Result<()> {
        self.send(BatchCommand::Shutdown)
    }

    pub async fn snapshot(&self) -> Result<BatcherSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BatchCommand::Snapshot(reply))
            .await
            .map_err(|_| CorkboardError::BatcherClosed)?;
        rx.await.map_err(|_| CorkboardError::BatcherClosed)
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    fn send(&self, cmd: BatchCommand) -> Result<()> {
        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => CorkboardError::QueueFull(self.capacity),
            TrySendError::Closed(_) => CorkboardError::BatcherClosed,
        })
    }
}

/// Outcome of one flush task.
struct FlushReport {
    trigger: FlushTrigger,
    edits: usize,
    chunks_sent: usize,
    outcome: Result<()>,
    /// Entries of the failed chunk and everything after it.
    unsent: Vec<BatchEntry>,
    refreshed: Result<Vec<Card>>,
}

/// The running flush. Keeps a copy of its job so a dead task can be requeued.
struct InFlight {
    trigger: FlushTrigger,
    job: Vec<BatchEntry>,
    handle: JoinHandle<FlushReport>,
}

impl InFlight {
    fn into_report(self, joined: std::result::Result<FlushReport, JoinError>) -> FlushReport {
        match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    "[batch] flush task died with {} edits: {}",
                    self.job.len(),
                    e
                );
                let error = CorkboardError::FlushAborted(e.to_string());
                FlushReport {
                    trigger: self.trigger,
                    edits: self.job.len(),
                    chunks_sent: 0,
                    outcome: Err(error.clone()),
                    unsent: self.job,
                    refreshed: Err(error),
                }
            }
        }
    }
}

/// The batcher actor. Owns the pending edits, the three timer deadlines and
/// the in-flight flush.
pub struct MutationBatcher {
    config: SyncConfig,
    backend: Arc<dyn BoardBackend>,
    board: SharedBoard,
    notices: Notices,
    pending: PendingEdits,
    retry: RetryController,
    interval_timer: Option<Instant>,
    max_delay_timer: Option<Instant>,
    retry_timer: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl MutationBatcher {
    /// Start the batcher task. It runs until `unload`/`shutdown` is called or
    /// every handle is dropped.
    pub fn spawn(
        config: SyncConfig,
        backend: Arc<dyn BoardBackend>,
        board: SharedBoard,
        notices: Notices,
    ) -> (BatcherHandle, JoinHandle<()>) {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let batcher = MutationBatcher::new(config, backend, board.clone(), notices);
        let task = tokio::spawn(batcher.run(rx));

        (
            BatcherHandle {
                tx,
                board,
                capacity,
            },
            task,
        )
    }

    fn new(
        config: SyncConfig,
        backend: Arc<dyn BoardBackend>,
        board: SharedBoard,
        notices: Notices,
    ) -> Self {
        MutationBatcher {
            retry: RetryController::from_config(&config),
            config,
            backend,
            board,
            notices,
            pending: PendingEdits::new(),
            interval_timer: None,
            max_delay_timer: None,
            retry_timer: None,
            in_flight: None,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<BatchCommand>) {
        tracing::info!(
            "[batch] started: interval={:?} max_delay={:?} chunk_size={} max_retries={}",
            self.config.batch_interval,
            self.config.max_delay,
            self.config.chunk_size,
            self.config.max_retries
        );

        loop {
            let interval = self.interval_timer;
            let max_delay = self.max_delay_timer;
            let retry_at = self.retry_timer;
            let flushing = self.in_flight.is_some();

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(BatchCommand::Enqueue { id, changes }) => self.on_enqueue(id, changes),
                    Some(BatchCommand::Flush(trigger)) => self.flush(trigger),
                    Some(BatchCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(BatchCommand::Forget(id)) => {
                        if self.pending.remove(&id).is_some() {
                            tracing::debug!("[batch] dropped queued edit for deleted card {}", id);
                        }
                    }
                    Some(BatchCommand::Unload) => {
                        self.unload().await;
                        break;
                    }
                    Some(BatchCommand::Shutdown) | None => {
                        self.dispose();
                        break;
                    }
                },
                _ = sleep_until_armed(interval) => {
                    self.interval_timer = None;
                    self.flush(FlushTrigger::Interval);
                }
                _ = sleep_until_armed(max_delay) => {
                    self.max_delay_timer = None;
                    self.flush(FlushTrigger::MaxDelay);
                }
                _ = sleep_until_armed(retry_at) => {
                    self.retry_timer = None;
                    self.flush(FlushTrigger::Retry);
                }
                joined = join_in_flight(&mut self.in_flight), if flushing => {
                    if let Some(flight) = self.in_flight.take() {
                        self.finish_flush(flight.into_report(joined));
                    }
                }
            }
        }

        tracing::info!("[batch] stopped");
    }

    fn on_enqueue(&mut self, id: CardId, changes: CardPatch) {
        self.pending.merge(id, changes);

        let now = Instant::now();
        self.interval_timer = Some(now + self.config.batch_interval);
        if self.max_delay_timer.is_none() {
            self.max_delay_timer = Some(now + self.config.max_delay);
        }
    }

    /// Snapshot pending edits and send them in the background. No-op while a
    /// flush is running or when nothing is queued.
    fn flush(&mut self, trigger: FlushTrigger) {
        if self.in_flight.is_some() {
            tracing::debug!("[batch] {:?} flush skipped: flush in progress", trigger);
            return;
        }
        if self.pending.is_empty() {
            tracing::debug!("[batch] {:?} flush skipped: nothing pending", trigger);
            return;
        }

        let job = self.pending.take_job();
        self.interval_timer = None;
        tracing::info!("[batch] {:?} flush of {} edits", trigger, job.len());

        let backend = Arc::clone(&self.backend);
        let chunk_size = self.config.chunk_size.max(1);
        let handle = tokio::spawn(send_job(backend, job.clone(), chunk_size, trigger));
        self.in_flight = Some(InFlight {
            trigger,
            job,
            handle,
        });
    }

    fn finish_flush(&mut self, report: FlushReport) {
        match report.outcome {
            Ok(()) => {
                tracing::info!(
                    "[batch] {:?} flush sent {} edits in {} chunk(s)",
                    report.trigger,
                    report.edits,
                    report.chunks_sent
                );
                let recovered = !self.retry.is_idle();
                self.retry.on_success();
                self.max_delay_timer = None;
                self.rearm_for_pending();
                if recovered {
                    self.notices.raise(Notice::new(NoticeKind::SyncRestored));
                }
            }
            Err(ref error) => match self.retry.on_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::warn!(
                        "[retry] flush failed after {} chunk(s) (transient={}): {}; retry {} in {:?}",
                        report.chunks_sent,
                        error.is_transient(),
                        error,
                        attempt,
                        delay
                    );
                    self.pending.restore(report.unsent);
                    self.retry_timer = Some(Instant::now() + delay);
                    self.notices.raise(Notice::sync_failed(attempt, delay, error));
                }
                RetryDecision::GiveUp { attempts } => {
                    let dropped = report.unsent.len();
                    tracing::error!(
                        "[retry] giving up after {} attempts, dropping {} unsynced edits: {}",
                        attempts,
                        dropped,
                        CorkboardError::ExhaustedRetries { attempts }
                    );
                    self.notices.raise(Notice::new(NoticeKind::SyncAbandoned {
                        attempts,
                        dropped_edits: dropped,
                        error: error.to_string(),
                    }));
                    self.rearm_for_pending();
                }
            },
        }

        self.reconcile(report.refreshed);
    }

    /// Edits that arrived mid-flight may have had their timers fire while the
    /// flush was skipped. Make sure they have deadlines again.
    fn rearm_for_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let now = Instant::now();
        self.max_delay_timer.get_or_insert(now + self.config.max_delay);
        self.interval_timer
            .get_or_insert(now + self.config.batch_interval);
    }

    /// Replace the board with the server's view, then lay still-queued edits
    /// back on top so the display keeps showing them.
    fn reconcile(&self, refreshed: Result<Vec<Card>>) {
        match refreshed {
            Ok(cards) => {
                let queued = self.pending.entries();
                let mut board = self.board.write();
                board.replace_all(cards);
                board.apply_entries(&queued);
                tracing::debug!(
                    "[batch] board refreshed: {} cards, {} queued edits re-applied",
                    board.len(),
                    queued.len()
                );
            }
            Err(e) => tracing::warn!("[batch] refresh after flush failed: {}", e),
        }
    }

    fn snapshot(&self) -> BatcherSnapshot {
        BatcherSnapshot {
            pending: self.pending.len(),
            flushing: self.in_flight.is_some(),
            retry_count: self.retry.retry_count(),
            current_backoff: self.retry.current_backoff(),
            interval_armed: self.interval_timer.is_some(),
            max_delay_armed: self.max_delay_timer.is_some(),
            retry_armed: self.retry_timer.is_some(),
        }
    }

    fn clear_timers(&mut self) {
        self.interval_timer = None;
        self.max_delay_timer = None;
        self.retry_timer = None;
    }

    /// Best effort: let a running flush finish, send whatever is still
    /// queued, and stop once `unload_grace` has elapsed either way.
    async fn unload(&mut self) {
        self.clear_timers();
        let deadline = Instant::now() + self.config.unload_grace;

        loop {
            if self.in_flight.is_none() {
                self.flush(FlushTrigger::Unload);
            }
            let Some(flight) = self.in_flight.take() else {
                break;
            };
            let queued = flight.job.len();
            match timeout_at(deadline, flight.handle).await {
                Ok(Ok(report)) => match report.outcome {
                    Ok(()) => tracing::info!("[batch] unload flush sent {} edits", report.edits),
                    Err(e) => {
                        tracing::warn!(
                            "[batch] unload flush failed, {} edits lost: {}",
                            report.unsent.len(),
                            e
                        );
                        break;
                    }
                },
                Ok(Err(e)) => {
                    tracing::error!(
                        "[batch] unload flush task died, {} edits lost: {}",
                        queued,
                        e
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "[batch] unload flush still running after {:?}, abandoning it",
                        self.config.unload_grace
                    );
                    break;
                }
            }
        }

        self.dispose();
    }

    fn dispose(&mut self) {
        self.clear_timers();
        let dropped = self.pending.clear();
        if dropped > 0 {
            tracing::warn!("[batch] shutting down with {} unsent edits", dropped);
        }
    }
}

async fn send_job(
    backend: Arc<dyn BoardBackend>,
    mut job: Vec<BatchEntry>,
    chunk_size: usize,
    trigger: FlushTrigger,
) -> FlushReport {
    let edits = job.len();
    let mut chunks_sent = 0;
    let mut start = 0;
    let mut outcome = Ok(());

    while start < job.len() {
        let end = (start + chunk_size).min(job.len());
        if let Err(e) = backend.send_batch(&job[start..end]).await {
            outcome = Err(e);
            break;
        }
        chunks_sent += 1;
        start = end;
    }

    let unsent = if outcome.is_err() {
        job.split_off(start)
    } else {
        Vec::new()
    };
    let refreshed = backend.refresh_entities().await;

    FlushReport {
        trigger,
        edits,
        chunks_sent,
        outcome,
        unsent,
        refreshed,
    }
}

async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(
    in_flight: &mut Option<InFlight>,
) -> std::result::Result<FlushReport, JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.handle).await,
        None => std::future::pending().await,
    }
}
