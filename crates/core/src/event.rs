// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events delivered into the supervisor's serialized queue.
//!
//! Background activities (exit waiters, samplers, watchers, probes,
//! scheduled timers) never touch the registry directly; they describe what
//! happened as an [`Event`] and the supervisor applies it in FIFO order.

use crate::id::EntryId;
use serde::{Deserialize, Serialize};

/// Which resource limit a threshold event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Memory,
    Cpu,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// A state-machine input produced by a background activity.
///
/// `epoch` fields tie an event to one child incarnation: every spawn bumps
/// the entry's epoch, and the supervisor drops events whose epoch is stale
/// so a timer or exit from a replaced child cannot affect its successor.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The child process exited on its own.
    ChildExit {
        id: EntryId,
        epoch: u64,
        exit_code: Option<i32>,
        signal: Option<i32>,
    },

    /// Periodic sample for a monitored entry.
    Metrics {
        id: EntryId,
        epoch: u64,
        cpu_avg: f32,
        rss_bytes: u64,
    },

    /// A hysteresis counter fired.
    ThresholdExceeded {
        id: EntryId,
        epoch: u64,
        kind: LimitKind,
        current: f64,
        limit: f64,
    },

    /// Advisory: RSS crossed 80% of the memory limit.
    MemoryWarning {
        id: EntryId,
        epoch: u64,
        rss_bytes: u64,
        limit_bytes: u64,
    },

    /// Debounced filesystem change under a watched entry's script directory.
    FileChange { id: EntryId },

    /// Outcome of the post-spawn readiness probe.
    ProbeResult {
        id: EntryId,
        epoch: u64,
        healthy: bool,
    },

    /// A granted restart's backoff delay has elapsed.
    RestartDue { id: EntryId, epoch: u64 },

    /// The 10 s stop grace period elapsed without a child exit.
    StopTimeout { id: EntryId, epoch: u64 },
}

impl Event {
    /// Entry the event belongs to.
    pub fn entry_id(&self) -> &EntryId {
        match self {
            Self::ChildExit { id, .. }
            | Self::Metrics { id, .. }
            | Self::ThresholdExceeded { id, .. }
            | Self::MemoryWarning { id, .. }
            | Self::FileChange { id }
            | Self::ProbeResult { id, .. }
            | Self::RestartDue { id, .. }
            | Self::StopTimeout { id, .. } => id,
        }
    }
}
