// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level errors surfaced to the control plane.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no process found matching '{0}'")]
    NotFound(String),

    #[error("a process named '{0}' already exists")]
    NameTaken(String),

    #[error("failed to spawn '{name}': {message}")]
    SpawnFailed { name: String, message: String },

    #[error("failed to signal pid {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("restart denied for '{name}': {reason}")]
    PolicyDenied { name: String, reason: String },

    #[error("supervisor is shutting down")]
    Unavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
