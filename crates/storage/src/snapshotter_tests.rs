// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::snapshot::Snapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn counted_producer() -> (Arc<AtomicUsize>, impl Fn() -> Snapshot + Send + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = Arc::clone(&calls);
    let producer = move || {
        calls_in.fetch_add(1, Ordering::SeqCst);
        Snapshot::new(vec![])
    };
    (calls, producer)
}

#[tokio::test]
async fn burst_of_marks_coalesces_to_one_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (calls, producer) = counted_producer();

    let snapshotter = Snapshotter::spawn(path.clone(), Duration::from_millis(50), producer);
    for _ in 0..20 {
        snapshotter.mark_dirty();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(path.exists());
}

#[tokio::test]
async fn marks_during_quiesce_extend_the_wait() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (calls, producer) = counted_producer();

    let snapshotter = Snapshotter::spawn(path.clone(), Duration::from_millis(100), producer);
    snapshotter.mark_dirty();

    // Keep poking inside the quiescent window; no write should land yet.
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        snapshotter.mark_dirty();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn flush_writes_immediately() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (calls, producer) = counted_producer();

    let snapshotter = Snapshotter::spawn(path.clone(), Duration::from_secs(60), producer);
    snapshotter.flush().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(path.exists());
}

#[tokio::test]
async fn flush_resolves_a_pending_dirty_window() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (calls, producer) = counted_producer();

    // Long quiesce: only the flush can make the write happen promptly.
    let snapshotter = Snapshotter::spawn(path.clone(), Duration::from_secs(60), producer);
    snapshotter.mark_dirty();
    tokio::time::sleep(Duration::from_millis(20)).await;
    snapshotter.flush().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(path.exists());
}

#[tokio::test]
async fn write_failure_is_swallowed() {
    let dir = tempdir().unwrap();
    // Point at a path whose parent is a file, so create_dir_all fails.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let path = blocker.join("state.json");
    let (calls, producer) = counted_producer();

    let snapshotter = Snapshotter::spawn(path, Duration::from_millis(20), producer);
    snapshotter.mark_dirty();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Producer ran, write failed, nothing panicked, handle still usable.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    snapshotter.mark_dirty();
}
