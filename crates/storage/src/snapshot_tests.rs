// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::tempdir;
use warden_core::{Entry, EntryId, EntryState, ProcessSpec, RestartReason};

fn test_entry(id: &str, name: &str) -> Entry {
    let mut entry = Entry::new(EntryId::new(id), name, ProcessSpec::for_script("server.js"));
    entry.state = EntryState::Running;
    entry.os_pid = 4321;
    entry.restart_count = 2;
    entry.last_restart_reason = Some(RestartReason::Crash);
    entry
}

#[test]
fn save_and_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let snapshot = Snapshot::new(vec![test_entry("aaaaaaaaaa", "api")]);
    snapshot.save(&path).unwrap();
    assert!(path.exists());

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.version, SNAPSHOT_VERSION);
    assert_eq!(loaded.entries.len(), 1);
    assert_eq!(loaded.entries[0].name, "api");
    assert_eq!(loaded.entries[0].restart_count, 2);
    assert_eq!(
        loaded.entries[0].last_restart_reason,
        Some(RestartReason::Crash)
    );
}

#[test]
fn load_missing_file_is_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    assert!(Snapshot::load(&path).unwrap().is_none());
}

#[test]
fn save_leaves_no_tmp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    Snapshot::new(vec![]).save(&path).unwrap();

    assert!(path.exists());
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[test]
fn corrupt_snapshot_is_quarantined() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"{\"version\": 1, \"entr").unwrap();
    drop(f);

    let loaded = Snapshot::load(&path).unwrap();
    assert!(loaded.is_none());
    assert!(!path.exists());
    assert!(dir.path().join("state.json.backup").exists());
}

#[test]
fn save_preserves_multiple_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let entries: Vec<Entry> = (0..3)
        .map(|i| test_entry(&format!("id{i}aaaaaaa"), &format!("app-{i}")))
        .collect();
    Snapshot::new(entries).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.entries.len(), 3);
    for (i, entry) in loaded.entries.iter().enumerate() {
        assert_eq!(entry.name, format!("app-{i}"));
    }
}
