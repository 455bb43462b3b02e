// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, pid-file discipline, socket binding, restore.

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};
use warden_core::Entry;
use warden_storage::{Snapshot, SnapshotError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("daemon already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, #[source] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixed paths for one daemon instance.
///
/// `WARDEN_DATA_DIR` and `WARDEN_SOCKET` override the defaults so tests
/// and parallel instances stay out of each other's way.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub logs_dir: PathBuf,
    pub crashes_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let data_dir = match std::env::var_os("WARDEN_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(LifecycleError::NoHomeDir)?
                .join(".warden"),
        };
        let socket_path = match std::env::var_os("WARDEN_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("/tmp/warden.sock"),
        };

        Ok(Self {
            socket_path,
            pid_path: data_dir.join("daemon.pid"),
            log_path: data_dir.join("daemon.log"),
            snapshot_path: data_dir.join("state.json"),
            logs_dir: data_dir.join("logs"),
            crashes_dir: data_dir.join("crashes"),
            data_dir,
        })
    }

    /// Create the data directory tree.
    pub fn ensure_dirs(&self) -> Result<(), LifecycleError> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        std::fs::create_dir_all(&self.crashes_dir)?;
        Ok(())
    }
}

/// True when `pid` names a live process we may signal.
pub fn process_exists(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Claim the pid file, refusing to start over a live daemon.
///
/// A pid file naming a dead process is stale (crash or SIGKILL) and is
/// overwritten.
pub fn acquire_pid_file(config: &Config) -> Result<(), LifecycleError> {
    if let Ok(content) = std::fs::read_to_string(&config.pid_path) {
        if let Ok(pid) = content.trim().parse::<u32>() {
            if process_exists(pid) {
                return Err(LifecycleError::AlreadyRunning { pid });
            }
            warn!(pid, "removing stale pid file");
        }
    }
    std::fs::write(&config.pid_path, format!("{}\n", std::process::id()))?;
    Ok(())
}

/// Bind the control socket, clearing any stale file first.
///
/// The pid-file check has already established that no other daemon is
/// alive, so a leftover socket file is garbage from a hard kill.
pub fn bind_socket(config: &Config) -> Result<UnixListener, LifecycleError> {
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))
}

/// Entries from the last snapshot. A corrupt file has already been
/// quarantined by the loader; the daemon starts empty.
pub fn load_entries(config: &Config) -> Result<Vec<Entry>, LifecycleError> {
    match Snapshot::load(&config.snapshot_path)? {
        Some(snapshot) => {
            info!(
                entries = snapshot.entries.len(),
                "loaded snapshot from {}",
                config.snapshot_path.display()
            );
            Ok(snapshot.entries)
        }
        None => Ok(Vec::new()),
    }
}

/// Remove the pid file and socket on the way out.
pub fn release(config: &Config) {
    if let Err(e) = std::fs::remove_file(&config.pid_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove pid file");
        }
    }
    if let Err(e) = std::fs::remove_file(&config.socket_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove socket file");
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
