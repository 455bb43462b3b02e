// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The supervision engine: registry, restart policy, background monitors,
//! and the per-entry state machine that ties them together.

mod error;
mod health;
mod policy;
mod registry;
mod sampler;
mod spawn;
mod supervisor;
mod watcher;

pub use error::SupervisorError;
pub use health::{HealthProbe, PROBE_MAX_ATTEMPTS, PROBE_RETRY_GAP, PROBE_TIMEOUT};
pub use policy::{
    DenyReason, PolicyDecision, RestartPolicy, CRASH_LOOP_THRESHOLD, CRASH_WINDOW_MS,
};
pub use registry::Registry;
pub use sampler::{MonitorState, SampleOutcome, CPU_TRIP_SAMPLES, MEM_TRIP_SAMPLES};
pub use supervisor::{
    Command, CommandOutcome, EntryView, EventSender, StatusDetail, Supervisor, SupervisorDeps,
    SupervisorHandle, Target,
};
pub use watcher::{IgnoreSet, WatchError};
