// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use tokio::io::AsyncReadExt;

fn sh_spec(dir: &std::path::Path, body: &str) -> ProcessSpec {
    let script = dir.join("script.sh");
    std::fs::write(&script, body).unwrap();
    let mut spec = ProcessSpec::for_script(script);
    spec.interpreter = "sh".to_string();
    spec.cwd = Some(dir.to_path_buf());
    spec
}

#[tokio::test]
async fn spawns_and_reports_a_pid() {
    let dir = tempdir().unwrap();
    let spec = sh_spec(dir.path(), "exit 0\n");

    let spawned = spawn_child(&spec).unwrap();
    assert!(spawned.pid > 0);

    let mut child = spawned.child;
    let status = child.wait().await.unwrap();
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
async fn env_overlay_reaches_the_child() {
    let dir = tempdir().unwrap();
    let mut spec = sh_spec(dir.path(), "printf '%s' \"$WARDEN_TEST_VALUE\"\n");
    spec.env
        .insert("WARDEN_TEST_VALUE".to_string(), "overlaid".to_string());

    let mut spawned = spawn_child(&spec).unwrap();
    let mut stdout = spawned.child.stdout.take().unwrap();
    spawned.child.wait().await.unwrap();

    let mut out = String::new();
    stdout.read_to_string(&mut out).await.unwrap();
    assert_eq!(out, "overlaid");
}

#[tokio::test]
async fn relative_scripts_resolve_against_cwd() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("rel.sh"), "printf ok\n").unwrap();
    let mut spec = ProcessSpec::for_script("rel.sh");
    spec.interpreter = "sh".to_string();
    spec.cwd = Some(dir.path().to_path_buf());

    let mut spawned = spawn_child(&spec).unwrap();
    let mut stdout = spawned.child.stdout.take().unwrap();
    let status = spawned.child.wait().await.unwrap();
    assert_eq!(status.code(), Some(0));

    let mut out = String::new();
    stdout.read_to_string(&mut out).await.unwrap();
    assert_eq!(out, "ok");
}

#[tokio::test]
async fn missing_interpreter_is_a_spawn_error() {
    let dir = tempdir().unwrap();
    let mut spec = sh_spec(dir.path(), "exit 0\n");
    spec.interpreter = "/definitely/not/an/interpreter".to_string();

    assert!(spawn_child(&spec).is_err());
}

#[tokio::test]
async fn nonzero_exit_codes_are_observable() {
    let dir = tempdir().unwrap();
    let spec = sh_spec(dir.path(), "exit 3\n");

    let mut spawned = spawn_child(&spec).unwrap();
    let status = spawned.child.wait().await.unwrap();
    assert_eq!(status.code(), Some(3));
}

#[tokio::test]
async fn sigterm_shows_up_as_a_signal() {
    use std::os::unix::process::ExitStatusExt;

    let dir = tempdir().unwrap();
    let spec = sh_spec(dir.path(), "sleep 30\n");

    let mut spawned = spawn_child(&spec).unwrap();
    send_signal(spawned.pid, Signal::SIGTERM).unwrap();
    let status = spawned.child.wait().await.unwrap();
    assert_eq!(status.signal(), Some(libc_sigterm()));
}

fn libc_sigterm() -> i32 {
    Signal::SIGTERM as i32
}
