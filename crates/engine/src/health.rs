// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP readiness probing.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Per-request transport timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Gap between retry attempts.
pub const PROBE_RETRY_GAP: Duration = Duration::from_secs(2);

/// Attempts within one `wait_ready` budget.
pub const PROBE_MAX_ATTEMPTS: u32 = 3;

/// Readiness prober. TLS is selected by the URL scheme; default ports
/// (80/443) come from the URL layer.
#[derive(Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// One GET. Success is any 2xx status; the body is drained so the
    /// connection can be reused.
    pub async fn check(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                let _ = response.bytes().await;
                ok
            }
            Err(e) => {
                debug!(url, error = %e, "readiness probe failed");
                false
            }
        }
    }

    /// Retry `check` with fixed gaps until it succeeds, the attempt budget
    /// is spent, or `overall_timeout` elapses. Returns true on the first
    /// success.
    pub async fn wait_ready(&self, url: &str, overall_timeout: Duration) -> bool {
        let deadline = Instant::now() + overall_timeout;

        for attempt in 1..=PROBE_MAX_ATTEMPTS {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            if remaining.is_zero() {
                return false;
            }

            match tokio::time::timeout(remaining, self.check(url)).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(_) => return false,
            }

            if attempt < PROBE_MAX_ATTEMPTS {
                let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                    return false;
                };
                tokio::time::sleep(PROBE_RETRY_GAP.min(remaining)).await;
            }
        }

        false
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
