// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn config_in(dir: &std::path::Path) -> Config {
    let data_dir = dir.join("data");
    Config {
        socket_path: dir.join("warden.sock"),
        pid_path: data_dir.join("daemon.pid"),
        log_path: data_dir.join("daemon.log"),
        snapshot_path: data_dir.join("state.json"),
        logs_dir: data_dir.join("logs"),
        crashes_dir: data_dir.join("crashes"),
        data_dir,
    }
}

#[test]
fn pid_file_claims_and_records_our_pid() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    acquire_pid_file(&config).unwrap();
    let recorded: u32 = std::fs::read_to_string(&config.pid_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(recorded, std::process::id());
}

#[test]
fn live_pid_refuses_a_second_daemon() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    // Our own pid is definitely alive.
    std::fs::write(&config.pid_path, format!("{}\n", std::process::id())).unwrap();
    let err = acquire_pid_file(&config).unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyRunning { .. }));
}

#[test]
fn stale_pid_file_is_overwritten() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    // Max pid on Linux is bounded well below this; nothing alive here.
    std::fs::write(&config.pid_path, "999999999\n").unwrap();
    acquire_pid_file(&config).unwrap();
    let recorded: u32 = std::fs::read_to_string(&config.pid_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(recorded, std::process::id());
}

#[test]
fn garbage_pid_file_is_overwritten() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    std::fs::write(&config.pid_path, "not-a-pid\n").unwrap();
    acquire_pid_file(&config).unwrap();
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    std::fs::write(&config.socket_path, b"stale").unwrap();
    let listener = bind_socket(&config).unwrap();
    drop(listener);
    release(&config);
    assert!(!config.socket_path.exists());
}

#[test]
fn missing_snapshot_restores_nothing() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();
    assert!(load_entries(&config).unwrap().is_empty());
}

#[test]
fn corrupt_snapshot_is_quarantined_and_restores_nothing() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    std::fs::write(&config.snapshot_path, b"{ definitely not json").unwrap();
    assert!(load_entries(&config).unwrap().is_empty());
    assert!(!config.snapshot_path.exists());
    assert!(config
        .data_dir
        .join("state.json.backup")
        .exists());
}

#[test]
fn release_is_quiet_when_nothing_exists() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    release(&config);
}
