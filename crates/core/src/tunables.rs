// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine timing constants, grouped and overridable for tests.
//!
//! Constructed once at daemon startup and passed down immutably. The
//! `WARDEN_*_MS` variables exist so integration tests can compress the
//! slow paths (sampling ticks, stop grace) without recompiling.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Tunables {
    /// Interval between resource samples.
    pub sample_interval: Duration,
    /// Soft deadline between SIGTERM and SIGKILL on stop.
    pub stop_timeout: Duration,
    /// Trailing-edge debounce for path-watch events.
    pub watch_debounce: Duration,
    /// Quiescent interval before a dirty snapshot is written.
    pub snapshot_quiesce: Duration,
    /// Overall budget for the post-spawn readiness probe.
    pub ready_timeout: Duration,
    /// Force-exit deadline for daemon shutdown.
    pub shutdown_watchdog: Duration,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            watch_debounce: Duration::from_millis(500),
            snapshot_quiesce: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(10),
            shutdown_watchdog: Duration::from_secs(10),
        }
    }
}

impl Tunables {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut t = Self::default();
        if let Some(ms) = env_ms("WARDEN_SAMPLE_INTERVAL_MS") {
            t.sample_interval = ms;
        }
        if let Some(ms) = env_ms("WARDEN_STOP_TIMEOUT_MS") {
            t.stop_timeout = ms;
        }
        if let Some(ms) = env_ms("WARDEN_WATCH_DEBOUNCE_MS") {
            t.watch_debounce = ms;
        }
        if let Some(ms) = env_ms("WARDEN_SNAPSHOT_QUIESCE_MS") {
            t.snapshot_quiesce = ms;
        }
        if let Some(ms) = env_ms("WARDEN_READY_TIMEOUT_MS") {
            t.ready_timeout = ms;
        }
        t
    }
}

fn env_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "tunables_tests.rs"]
mod tests;
