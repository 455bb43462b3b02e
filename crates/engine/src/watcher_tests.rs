// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::supervisor::{EventSender, Msg};
use tempfile::tempdir;

#[yare::parameterized(
    node_modules = { "project/node_modules/lib/index.js" },
    git = { "project/.git/HEAD" },
    logs_dir = { "project/logs/out.txt" },
    log_file = { "project/server.log" },
    nested_log = { "project/deep/dir/app.log" },
)]
fn builtin_ignores_match(path: &str) {
    let set = IgnoreSet::build(&[], Path::new("/tmp/warden-data")).unwrap();
    assert!(set.matches(Path::new(path)), "{path} should be ignored");
}

#[yare::parameterized(
    script = { "project/server.js" },
    nested = { "project/src/routes/index.js" },
    dotfile = { "project/.env" },
)]
fn source_paths_are_not_ignored(path: &str) {
    let set = IgnoreSet::build(&[], Path::new("/tmp/warden-data")).unwrap();
    assert!(!set.matches(Path::new(path)), "{path} should not be ignored");
}

#[test]
fn data_directory_is_always_ignored() {
    let set = IgnoreSet::build(&[], Path::new("/home/u/.warden")).unwrap();
    assert!(set.matches(Path::new("/home/u/.warden/logs/x/app.log")));
    assert!(set.matches(Path::new("/home/u/.warden/state.json")));
}

#[test]
fn spec_patterns_extend_the_builtins() {
    let set = IgnoreSet::build(
        &["tmp".to_string(), "*.cache".to_string()],
        Path::new("/tmp/warden-data"),
    )
    .unwrap();
    assert!(set.matches(Path::new("project/tmp/scratch.txt")));
    assert!(set.matches(Path::new("project/assets.cache")));
    assert!(!set.matches(Path::new("project/src/main.js")));
}

#[test]
fn invalid_pattern_is_reported() {
    let err = IgnoreSet::build(&["[".to_string()], Path::new("/tmp")).unwrap_err();
    assert!(matches!(err, WatchError::BadPattern { .. }));
}

fn test_sender() -> (EventSender, mpsc::UnboundedReceiver<Msg>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender::new(tx), rx)
}

async fn recv_change(rx: &mut mpsc::UnboundedReceiver<Msg>, within: Duration) -> bool {
    match tokio::time::timeout(within, rx.recv()).await {
        Ok(Some(Msg::Event(Event::FileChange { .. }))) => true,
        _ => false,
    }
}

#[tokio::test]
async fn burst_of_writes_collapses_to_one_change() {
    let dir = tempdir().unwrap();
    let (events, mut rx) = test_sender();
    let ignores = IgnoreSet::build(&[], Path::new("/nonexistent-data-dir")).unwrap();

    let handle = spawn_watcher(
        EntryId::new("abc1234567"),
        dir.path().to_path_buf(),
        ignores,
        Duration::from_millis(100),
        events,
    )
    .unwrap();

    let file = dir.path().join("server.js");
    for i in 0..10 {
        std::fs::write(&file, format!("// rev {i}\n")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(recv_change(&mut rx, Duration::from_secs(2)).await);
    // The burst produced exactly one event; the channel stays quiet.
    assert!(!recv_change(&mut rx, Duration::from_millis(300)).await);

    handle.stop();
}

#[tokio::test]
async fn separate_bursts_produce_separate_changes() {
    let dir = tempdir().unwrap();
    let (events, mut rx) = test_sender();
    let ignores = IgnoreSet::build(&[], Path::new("/nonexistent-data-dir")).unwrap();

    let handle = spawn_watcher(
        EntryId::new("abc1234567"),
        dir.path().to_path_buf(),
        ignores,
        Duration::from_millis(50),
        events,
    )
    .unwrap();

    let file = dir.path().join("server.js");
    std::fs::write(&file, "one").unwrap();
    assert!(recv_change(&mut rx, Duration::from_secs(2)).await);

    tokio::time::sleep(Duration::from_millis(150)).await;
    std::fs::write(&file, "two").unwrap();
    assert!(recv_change(&mut rx, Duration::from_secs(2)).await);

    handle.stop();
}

#[tokio::test]
async fn ignored_files_do_not_trigger_changes() {
    let dir = tempdir().unwrap();
    let (events, mut rx) = test_sender();
    let ignores = IgnoreSet::build(&[], Path::new("/nonexistent-data-dir")).unwrap();

    let handle = spawn_watcher(
        EntryId::new("abc1234567"),
        dir.path().to_path_buf(),
        ignores,
        Duration::from_millis(50),
        events,
    )
    .unwrap();

    std::fs::write(dir.path().join("debug.log"), "noise").unwrap();
    assert!(!recv_change(&mut rx, Duration::from_millis(400)).await);

    handle.stop();
}
