// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction and exponential-backoff computation.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time, injectable for tests.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually-advanced clock for deterministic tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now_ms: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn at(ms: u64) -> Self {
        let clock = Self::default();
        clock.set(ms);
        clock
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms
            .fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Delay before the next restart attempt.
///
/// Doubles from `min_delay_ms` per prior consecutive failed attempt,
/// capped at `max_delay_ms`. `attempts` counts failures since the last
/// healthy run, so the first retry waits `min_delay_ms`.
pub fn restart_delay(min_delay_ms: u64, max_delay_ms: u64, attempts: u32) -> u64 {
    let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
    min_delay_ms.saturating_mul(factor).min(max_delay_ms)
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
