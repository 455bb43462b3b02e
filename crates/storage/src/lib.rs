// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for warden: registry snapshots, crash journal, log sinks.

mod crash_journal;
mod log_sink;
mod snapshot;
mod snapshotter;

pub use crash_journal::{CrashJournal, CrashRecord, CrashStats, JournalError};
pub use log_sink::{LogSink, LogStream, SinkError, MAX_LOG_FILES, MAX_LOG_SIZE};
pub use snapshot::{Snapshot, SnapshotError, SNAPSHOT_VERSION};
pub use snapshotter::Snapshotter;
