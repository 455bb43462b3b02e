// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervised-entry data model.
//!
//! An [`Entry`] is the in-memory record for one supervised child program.
//! Its [`ProcessSpec`] is the immutable declaration supplied at start time;
//! everything else is runtime bookkeeping mutated only by the supervisor.

use crate::id::EntryId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Errored,
    Restarting,
}

impl EntryState {
    /// True while a child OS process may be attached to the entry.
    pub fn has_live_child(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
            Self::Restarting => "restarting",
        };
        write!(f, "{s}")
    }
}

/// Why an entry was last restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartReason {
    Manual,
    Crash,
    Memory,
    Cpu,
    FileChange,
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::Crash => "crash",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::FileChange => "file-change",
        };
        write!(f, "{s}")
    }
}

/// Framing applied to captured child output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Where framed child output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    File,
    Stdout,
}

fn default_interpreter() -> String {
    "node".to_string()
}

fn default_instances() -> u32 {
    1
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_restarts() -> u32 {
    10
}

/// Immutable declaration of what to run and how to supervise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    /// Script path, resolved against `cwd` at spawn time.
    pub script: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; defaults to the starting client's cwd.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment overlay applied on top of the daemon's environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Runtime the script is handed to.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Accepted for manifest compatibility; the engine spawns one instance.
    #[serde(default = "default_instances")]
    pub instances: u32,

    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub watch_ignore: Vec<String>,

    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,

    #[serde(default)]
    pub cpu_limit_percent: Option<f32>,

    /// Minimum delay between automatic restarts.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Readiness URL probed after spawn.
    #[serde(default)]
    pub health_check: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub log_output: LogOutput,

    /// Validated and carried; not consumed by the engine.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ProcessSpec {
    /// Minimal spec for a script with defaults everywhere else.
    pub fn for_script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            interpreter: default_interpreter(),
            instances: default_instances(),
            watch: false,
            watch_ignore: Vec::new(),
            memory_limit_bytes: None,
            cpu_limit_percent: None,
            restart_delay_ms: default_restart_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_restarts: default_max_restarts(),
            health_check: None,
            log_format: LogFormat::default(),
            log_output: LogOutput::default(),
            metrics_port: None,
        }
    }

    /// True when at least one resource limit is set.
    pub fn is_monitored(&self) -> bool {
        self.memory_limit_bytes.is_some() || self.cpu_limit_percent.is_some()
    }
}

/// In-memory record for one supervised child program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub name: String,
    pub spec: ProcessSpec,
    pub state: EntryState,

    /// OS pid of the live child; 0 when no child is attached.
    #[serde(default)]
    pub os_pid: u32,

    /// Epoch ms when the current child was spawned; 0 when none.
    #[serde(default)]
    pub start_time: u64,

    #[serde(default)]
    pub restart_count: u32,

    #[serde(default)]
    pub last_restart_time: Option<u64>,

    #[serde(default)]
    pub last_restart_reason: Option<RestartReason>,

    /// Most recent sampled CPU percentage (volatile).
    #[serde(default)]
    pub cpu_percent: f32,

    /// Most recent sampled resident set size in bytes (volatile).
    #[serde(default)]
    pub rss_bytes: u64,
}

impl Entry {
    pub fn new(id: EntryId, name: impl Into<String>, spec: ProcessSpec) -> Self {
        Self {
            id,
            name: name.into(),
            spec,
            state: EntryState::Starting,
            os_pid: 0,
            start_time: 0,
            restart_count: 0,
            last_restart_time: None,
            last_restart_reason: None,
            cpu_percent: 0.0,
            rss_bytes: 0,
        }
    }

    /// Milliseconds the current child has been alive, 0 when none.
    pub fn uptime_ms(&self, now_ms: u64) -> u64 {
        if self.state.has_live_child() && self.start_time > 0 {
            now_ms.saturating_sub(self.start_time)
        } else {
            0
        }
    }

    /// Clear the fields tied to a live child.
    pub fn detach_child(&mut self) {
        self.os_pid = 0;
        self.start_time = 0;
        self.cpu_percent = 0.0;
        self.rss_bytes = 0;
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
