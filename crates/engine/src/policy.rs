// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart policy: backoff schedule and crash-loop detection.
//!
//! Pure bookkeeping — the supervisor owns the clock and the timers. One
//! [`RestartPolicy`] exists per entry and survives across that entry's
//! automatic restarts.

use warden_core::{restart_delay, ProcessSpec};

/// Sliding window over which crashes are counted for loop detection.
pub const CRASH_WINDOW_MS: u64 = 60_000;

/// Crashes tolerated inside the window; the next one is a crash loop.
pub const CRASH_LOOP_THRESHOLD: usize = 5;

/// Why a restart was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Exit code 0 without a signal; nothing to recover from.
    CleanExit,
    /// Too many crashes inside the crash window.
    CrashLoop,
    /// Consecutive failed attempts exhausted `max_restarts`.
    MaxRestarts,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CleanExit => write!(f, "clean exit"),
            Self::CrashLoop => write!(f, "crash loop detected"),
            Self::MaxRestarts => write!(f, "max restarts reached"),
        }
    }
}

/// Verdict for one observed exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Respawn after `delay_ms`.
    Restart { delay_ms: u64 },
    Deny(DenyReason),
}

/// Per-entry restart book.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    min_delay_ms: u64,
    max_delay_ms: u64,
    max_restarts: u32,
    /// Consecutive failed attempts since the last healthy run.
    attempts: u32,
    /// Crash wall-timestamps within the window, oldest first.
    crash_times: Vec<u64>,
    in_crash_loop: bool,
}

impl RestartPolicy {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, max_restarts: u32) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms,
            max_restarts,
            attempts: 0,
            crash_times: Vec::new(),
            in_crash_loop: false,
        }
    }

    pub fn from_spec(spec: &ProcessSpec) -> Self {
        Self::new(spec.restart_delay_ms, spec.max_delay_ms, spec.max_restarts)
    }

    /// Evaluate an exit observed at `now_ms`.
    ///
    /// Crash-time pruning and the loop check run before the attempt budget,
    /// so a crash loop is reported as such even when attempts are also
    /// exhausted.
    pub fn on_exit(
        &mut self,
        exit_code: Option<i32>,
        signal: Option<i32>,
        now_ms: u64,
    ) -> PolicyDecision {
        if exit_code == Some(0) && signal.is_none() {
            return PolicyDecision::Deny(DenyReason::CleanExit);
        }

        self.crash_times.push(now_ms);
        self.crash_times
            .retain(|t| now_ms.saturating_sub(*t) <= CRASH_WINDOW_MS);

        // Five crashes may each earn a restart; a sixth inside the window
        // is a loop.
        if self.crash_times.len() > CRASH_LOOP_THRESHOLD {
            self.in_crash_loop = true;
            return PolicyDecision::Deny(DenyReason::CrashLoop);
        }

        if self.attempts >= self.max_restarts {
            return PolicyDecision::Deny(DenyReason::MaxRestarts);
        }

        let delay_ms = restart_delay(self.min_delay_ms, self.max_delay_ms, self.attempts);
        self.attempts += 1;
        PolicyDecision::Restart { delay_ms }
    }

    /// Called after a restarted child proves healthy.
    ///
    /// Clears the attempt counter and loop flag but keeps the crash window:
    /// a process that keeps crashing shortly after "recovering" must still
    /// trip loop detection.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.in_crash_loop = false;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn in_crash_loop(&self) -> bool {
        self.in_crash_loop
    }

    pub fn crashes_in_window(&self) -> usize {
        self.crash_times.len()
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
