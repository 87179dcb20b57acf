//! Scheduling, chunking and retry behaviour of the mutation batcher, on a
//! paused clock.

mod common;

use common::{card, drain, ms, spawn_batcher};
use corkboard::backend::memory::Operation;
use corkboard::sync::NoticeKind;
use corkboard::{BatchEntry, CardPatch, CorkboardError, SyncConfig};
use tokio::time::{sleep, Instant};

#[tokio::test(start_paused = true)]
async fn edits_merge_and_flush_after_quiet_period() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 100.0, 50.0)]);

    h.handle.enqueue("c1", CardPatch::title("A")).unwrap();
    sleep(ms(1000)).await;
    h.handle.enqueue("c1", CardPatch::content("B")).unwrap();
    let second = Instant::now();

    // Optimistic display before anything is sent.
    {
        let board = h.board.read();
        let c1 = board.card("c1").unwrap();
        assert_eq!(c1.title, "A");
        assert_eq!(c1.content, "B");
    }

    sleep(ms(4999)).await;
    assert!(h.backend.sent_batches().is_empty(), "interval restarted by second edit");

    sleep(ms(2)).await;
    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].at - second, ms(5000));
    assert_eq!(
        h.backend.sent_batches()[0],
        vec![BatchEntry {
            id: "c1".into(),
            changes: CardPatch {
                title: Some("A".into()),
                content: Some("B".into()),
                ..Default::default()
            },
        }]
    );

    // Every flush is followed by a refresh.
    assert_eq!(h.backend.calls_of(Operation::Refresh).len(), 1);
    assert_eq!(h.backend.card("c1").unwrap().title, "A");
}

#[tokio::test(start_paused = true)]
async fn flush_splits_into_chunks_of_fifty() {
    let h = spawn_batcher(SyncConfig::default(), vec![]);

    for i in 0..120 {
        h.handle
            .enqueue(format!("card-{i}"), CardPatch::title(format!("t{i}")))
            .unwrap();
    }
    h.handle.retry_now().unwrap();
    sleep(ms(1)).await;

    let sizes: Vec<usize> = h.backend.sent_batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert_eq!(h.backend.sent_batches()[2][19].id, "card-119");

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pending, 0);
    assert!(!snapshot.flushing);
}

#[tokio::test(start_paused = true)]
async fn failed_chunk_stops_the_job_and_requeues_it() {
    let h = spawn_batcher(SyncConfig::default(), vec![]);
    h.backend.fail_next(Operation::SendBatch, 1);

    for i in 0..120 {
        h.handle.enqueue(format!("card-{i}"), CardPatch::title("x")).unwrap();
    }
    h.handle.retry_now().unwrap();
    sleep(ms(1)).await;

    assert_eq!(h.backend.calls_of(Operation::SendBatch).len(), 1);
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pending, 120);
    assert_eq!(snapshot.retry_count, 1);
    assert!(snapshot.retry_armed);

    sleep(ms(1000)).await;
    let sizes: Vec<usize> = h.backend.sent_batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 50, 50, 20]);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_then_gives_up_and_reloads() {
    let mut h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 100.0, 50.0)]);
    h.backend.fail_next(Operation::SendBatch, 4);

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("lost")).unwrap();
    sleep(ms(20_000)).await;

    let offsets: Vec<_> = h
        .backend
        .calls_of(Operation::SendBatch)
        .iter()
        .map(|c| c.at - start)
        .collect();
    assert_eq!(offsets, vec![ms(5000), ms(6000), ms(8000), ms(12_000)]);
    assert_eq!(h.backend.calls_of(Operation::Refresh).len(), 4);

    let notices: Vec<_> = drain(&mut h.notices).into_iter().map(|n| n.kind).collect();
    assert_eq!(notices.len(), 4);
    for (notice, (attempt, delay)) in notices.iter().zip([(1, 1000), (2, 2000), (3, 4000)]) {
        match notice {
            NoticeKind::SyncFailed {
                attempt: a,
                retry_in_ms,
                ..
            } => {
                assert_eq!(*a, attempt);
                assert_eq!(*retry_in_ms, delay);
            }
            other => panic!("expected SyncFailed, got {:?}", other),
        }
    }
    assert!(matches!(
        notices[3],
        NoticeKind::SyncAbandoned {
            attempts: 4,
            dropped_edits: 1,
            ..
        }
    ));

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(snapshot.current_backoff, ms(1000));
    assert_eq!(snapshot.pending, 0);

    // The dropped edit is gone from the board after the reload.
    assert_eq!(h.board.read().card("c1").unwrap().title, "");

    // No further automatic attempts, not even when max-delay expires.
    sleep(ms(60_000)).await;
    assert_eq!(h.backend.calls_of(Operation::SendBatch).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn success_after_failure_resets_and_notifies() {
    let mut h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 100.0, 50.0)]);
    h.backend.fail_next(Operation::SendBatch, 1);

    h.handle.enqueue("c1", CardPatch::title("kept")).unwrap();
    sleep(ms(5001)).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.retry_count, 1);
    assert_eq!(snapshot.current_backoff, ms(2000));
    // Still displayed while waiting for the retry.
    assert_eq!(h.board.read().card("c1").unwrap().title, "kept");

    sleep(ms(1000)).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.retry_count, 0);
    assert_eq!(snapshot.current_backoff, ms(1000));
    assert!(!snapshot.max_delay_armed);
    assert_eq!(h.backend.card("c1").unwrap().title, "kept");

    let kinds: Vec<_> = drain(&mut h.notices).into_iter().map(|n| n.kind).collect();
    assert!(matches!(kinds[0], NoticeKind::SyncFailed { attempt: 1, .. }));
    assert_eq!(kinds[1], NoticeKind::SyncRestored);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_skips_the_wait() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 100.0, 50.0)]);
    h.backend.fail_next(Operation::SendBatch, 1);

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("x")).unwrap();
    sleep(ms(5200)).await;
    h.handle.retry_now().unwrap();
    sleep(ms(1)).await;

    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[1].at - start, ms(5200));

    // The retry timer still fires but finds nothing to send.
    sleep(ms(2000)).await;
    assert_eq!(h.backend.calls_of(Operation::SendBatch).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn only_one_flush_in_flight() {
    let h = spawn_batcher(
        SyncConfig::default(),
        vec![card("c1", 0.0, 0.0, 10.0, 10.0), card("c2", 50.0, 0.0, 10.0, 10.0)],
    );
    h.backend.set_latency(ms(3000));

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("one")).unwrap();
    sleep(ms(5500)).await;

    // Mid-flight: manual retry and the next interval are both skipped.
    h.handle.enqueue("c2", CardPatch::title("two")).unwrap();
    h.handle.retry_now().unwrap();
    sleep(ms(1)).await;
    assert!(h.handle.snapshot().await.unwrap().flushing);
    sleep(ms(5000)).await;
    assert_eq!(h.backend.calls_of(Operation::SendBatch).len(), 1);

    // First flight ends at 11s (send + refresh); c2 goes out on its own.
    sleep(ms(10_000)).await;
    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[1].at - start, ms(16_000));
    let batches = h.backend.sent_batches();
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].id, "c1");
    assert_eq!(batches[1].len(), 1);
    assert_eq!(batches[1][0].id, "c2");
}

#[tokio::test(start_paused = true)]
async fn edits_during_the_final_failed_flight_still_go_out() {
    let mut h = spawn_batcher(
        SyncConfig::default(),
        vec![card("c1", 0.0, 0.0, 10.0, 10.0), card("c2", 50.0, 0.0, 10.0, 10.0)],
    );
    // Each send and refresh takes 20s, so flights run 5-45, 46-86, 88-128
    // and 132-172.
    h.backend.set_latency(ms(20_000));
    h.backend.fail_next(Operation::SendBatch, 4);

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("lost")).unwrap();
    sleep(ms(133_000)).await;
    h.handle.enqueue("c2", CardPatch::title("late")).unwrap();

    // Both of c2's deadlines pass while the last attempt is still running.
    sleep(ms(39_500)).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(!snapshot.flushing);
    assert_eq!(snapshot.pending, 1);
    assert!(snapshot.interval_armed);
    assert!(snapshot.max_delay_armed);
    assert!(drain(&mut h.notices)
        .iter()
        .any(|n| matches!(n.kind, NoticeKind::SyncAbandoned { attempts: 4, .. })));

    sleep(ms(5000)).await;
    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 5);
    assert_eq!(sends[4].at - start, ms(177_000));
    let batches = h.backend.sent_batches();
    assert_eq!(
        batches[4],
        vec![BatchEntry {
            id: "c2".into(),
            changes: CardPatch::title("late"),
        }]
    );
    assert_eq!(h.board.read().card("c2").unwrap().title, "late");
}

#[tokio::test(start_paused = true)]
async fn max_delay_bounds_continuous_editing() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 10.0, 10.0)]);

    let start = Instant::now();
    for i in 0..35 {
        h.handle
            .enqueue("c1", CardPatch::content(format!("draft {i}")))
            .unwrap();
        sleep(ms(1000)).await;
    }

    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 1, "interval never elapsed, only max-delay fired");
    assert_eq!(sends[0].at - start, ms(30_000));
}

#[tokio::test(start_paused = true)]
async fn newer_edits_win_over_requeued_ones() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 10.0, 10.0)]);
    h.backend.set_latency(ms(2000));
    h.backend.fail_next(Operation::SendBatch, 1);

    h.handle
        .enqueue(
            "c1",
            CardPatch {
                title: Some("A".into()),
                content: Some("X".into()),
                ..Default::default()
            },
        )
        .unwrap();
    sleep(ms(6000)).await;
    // The first flush is still in flight.
    h.handle.enqueue("c1", CardPatch::title("B")).unwrap();

    // Fails at 7s, refresh done at 9s, retry at 10s.
    sleep(ms(4001)).await;
    let batches = h.backend.sent_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[1],
        vec![BatchEntry {
            id: "c1".into(),
            changes: CardPatch {
                title: Some("B".into()),
                content: Some("X".into()),
                ..Default::default()
            },
        }]
    );

    // The server still has the old card, but the refresh kept the queued edit on screen.
    assert_eq!(h.board.read().card("c1").unwrap().title, "B");
}

#[tokio::test(start_paused = true)]
async fn blank_ids_are_rejected() {
    let h = spawn_batcher(SyncConfig::default(), vec![]);

    let err = h.handle.enqueue("  ", CardPatch::title("x")).unwrap_err();
    assert!(matches!(err, CorkboardError::InvalidEntity(_)));

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pending, 0);
    assert!(!snapshot.interval_armed);
}

#[tokio::test(start_paused = true)]
async fn full_queue_is_reported() {
    let config = SyncConfig {
        queue_capacity: 2,
        ..SyncConfig::default()
    };
    let h = spawn_batcher(config, vec![]);

    // The actor has not run yet, so nothing is drained.
    h.handle.enqueue("a", CardPatch::title("1")).unwrap();
    h.handle.enqueue("b", CardPatch::title("2")).unwrap();
    assert_eq!(
        h.handle.enqueue("c", CardPatch::title("3")),
        Err(CorkboardError::QueueFull(2))
    );
}

#[tokio::test(start_paused = true)]
async fn unload_flushes_immediately() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 10.0, 10.0)]);

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("bye")).unwrap();
    h.handle.unload().unwrap();
    h.task.await.unwrap();

    let sends = h.backend.calls_of(Operation::SendBatch);
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].at - start, ms(0));
    assert_eq!(h.backend.card("c1").unwrap().title, "bye");
    assert_eq!(
        h.handle.enqueue("c1", CardPatch::title("late")),
        Err(CorkboardError::BatcherClosed)
    );
}

#[tokio::test(start_paused = true)]
async fn unload_gives_up_after_grace_period() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 10.0, 10.0)]);
    h.backend.set_latency(ms(10_000));

    let start = Instant::now();
    h.handle.enqueue("c1", CardPatch::title("slow")).unwrap();
    h.handle.unload().unwrap();
    h.task.await.unwrap();

    assert_eq!(start.elapsed(), ms(1000));
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_pending_edits() {
    let h = spawn_batcher(SyncConfig::default(), vec![card("c1", 0.0, 0.0, 10.0, 10.0)]);

    h.handle.enqueue("c1", CardPatch::title("never")).unwrap();
    h.handle.shutdown().unwrap();
    h.task.await.unwrap();

    sleep(ms(60_000)).await;
    assert!(h.backend.calls().is_empty());
}
