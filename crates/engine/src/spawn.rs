// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process spawning and signalling.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use warden_core::ProcessSpec;

use crate::error::SupervisorError;

pub(crate) struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
}

/// Spawn the interpreter against the resolved script path.
///
/// The child inherits the daemon's environment with `spec.env` overlaid,
/// gets a closed stdin and piped stdout/stderr, and is *not* detached —
/// the exit waiter owns the handle.
pub(crate) fn spawn_child(spec: &ProcessSpec) -> std::io::Result<SpawnedChild> {
    let script = resolve_script(spec);

    let mut cmd = Command::new(&spec.interpreter);
    cmd.arg(&script)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let child = cmd.spawn()?;
    let pid = child.id().ok_or_else(|| {
        std::io::Error::other("child exited before a pid could be observed")
    })?;

    Ok(SpawnedChild { child, pid })
}

fn resolve_script(spec: &ProcessSpec) -> PathBuf {
    if spec.script.is_absolute() {
        spec.script.clone()
    } else if let Some(cwd) = &spec.cwd {
        cwd.join(&spec.script)
    } else {
        spec.script.clone()
    }
}

/// Deliver a signal to a pid.
pub(crate) fn send_signal(pid: u32, signal: Signal) -> Result<(), SupervisorError> {
    kill(Pid::from_raw(pid as i32), signal).map_err(|e| SupervisorError::SignalFailed {
        pid,
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
