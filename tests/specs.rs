// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for the warden binaries.
//!
//! Black-box: these invoke the built `warden`/`wardend` binaries and check
//! stdout, stderr, and exit codes. The daemon specs point WARDEN_DATA_DIR
//! and WARDEN_SOCKET at a scratch directory so they never touch a real
//! installation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;
use predicates::prelude::PredicateStrExt;
use std::io::{BufRead, BufReader, Write};
use std::time::{Duration, Instant};

#[test]
fn cli_help_lists_every_action() {
    let output = Command::cargo_bin("warden").unwrap().arg("--help").assert();
    let output = output.success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for action in [
        "start", "stop", "restart", "status", "logs", "save", "delete", "startup", "unstartup",
    ] {
        assert!(stdout.contains(action), "help is missing '{action}'");
    }
}

#[test]
fn cli_reports_its_version() {
    Command::cargo_bin("warden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates_contains("warden"));
}

#[test]
fn daemon_reports_its_version() {
    Command::cargo_bin("wardend")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates_contains("wardend"));
}

#[test]
fn daemon_rejects_unknown_arguments() {
    Command::cargo_bin("wardend")
        .unwrap()
        .arg("--bogus")
        .assert()
        .code(1);
}

#[test]
fn missing_manifest_fails_before_any_daemon_contact() {
    Command::cargo_bin("warden")
        .unwrap()
        .args(["start", "--config", "/definitely/missing.yaml"])
        .assert()
        .code(1);
}

#[test]
fn unreachable_daemon_is_a_transport_failure() {
    Command::cargo_bin("warden")
        .unwrap()
        .env("WARDEN_SOCKET", "/tmp/warden-spec-no-such.sock")
        .arg("ping")
        .assert()
        .code(2);
}

#[test]
#[serial_test::serial]
fn full_lifecycle_against_a_real_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let socket = dir.path().join("warden.sock");
    let script = dir.path().join("app.sh");
    std::fs::write(&script, "sleep 30\n").unwrap();

    let wardend = assert_cmd::cargo::cargo_bin("wardend");

    let env = |cmd: &mut Command| {
        cmd.env("WARDEN_DATA_DIR", &data_dir)
            .env("WARDEN_SOCKET", &socket)
            .env("WARDEN_DAEMON_BINARY", &wardend)
            .env("WARDEN_STOP_TIMEOUT_MS", "1000");
    };

    // `start` auto-spawns the daemon, then starts the script.
    let mut cmd = Command::cargo_bin("warden").unwrap();
    env(&mut cmd);
    let assert = cmd
        .args([
            "start",
            script.to_str().unwrap(),
            "--name",
            "spec-app",
            "--interpreter",
            "sh",
        ])
        .timeout(Duration::from_secs(15))
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("Process started: spec-app ("), "{stdout}");

    // Status shows it running.
    let mut cmd = Command::cargo_bin("warden").unwrap();
    env(&mut cmd);
    let assert = cmd
        .args(["status"])
        .timeout(Duration::from_secs(15))
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("spec-app"), "{stdout}");
    assert!(stdout.contains("running"), "{stdout}");

    // Stop removes it.
    let mut cmd = Command::cargo_bin("warden").unwrap();
    env(&mut cmd);
    cmd.args(["stop", "spec-app"])
        .timeout(Duration::from_secs(15))
        .assert()
        .success()
        .stdout(predicates_contains("Process stopped: spec-app"));

    // A second stop is NotFound → exit 1.
    let mut cmd = Command::cargo_bin("warden").unwrap();
    env(&mut cmd);
    cmd.args(["stop", "spec-app"])
        .timeout(Duration::from_secs(15))
        .assert()
        .code(1);

    shutdown_daemon(&socket);
}

/// Ask the daemon to exit over the raw wire and wait for the socket to go.
fn shutdown_daemon(socket: &std::path::Path) {
    let Ok(mut stream) = std::os::unix::net::UnixStream::connect(socket) else {
        return;
    };
    stream
        .write_all(b"{\"action\":\"shutdown\"}\n")
        .unwrap();
    let mut reply = String::new();
    let _ = BufReader::new(&stream).read_line(&mut reply);

    let deadline = Instant::now() + Duration::from_secs(5);
    while socket.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn predicates_contains(needle: &str) -> impl predicates::Predicate<[u8]> + '_ {
    predicates::str::contains(needle).from_utf8()
}
