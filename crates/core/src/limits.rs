// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-limit value parsing and validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LimitError {
    #[error("invalid memory limit '{0}' (expected e.g. \"512mb\", \"1.5gb\")")]
    InvalidMemoryLimit(String),

    #[error("cpu limit {0} out of range (0-100)")]
    CpuOutOfRange(f32),
}

static MEMORY_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(b|kb|mb|gb)$").expect("static regex")
});

/// Parse a human memory limit such as `64mb` or `1.5 GB` into bytes.
pub fn parse_memory_limit(input: &str) -> Result<u64, LimitError> {
    let caps = MEMORY_LIMIT_RE
        .captures(input.trim())
        .ok_or_else(|| LimitError::InvalidMemoryLimit(input.to_string()))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| LimitError::InvalidMemoryLimit(input.to_string()))?;

    let multiplier: f64 = match caps[2].to_ascii_lowercase().as_str() {
        "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        _ => 1024.0 * 1024.0 * 1024.0,
    };

    Ok((value * multiplier) as u64)
}

/// Validate a CPU limit percentage.
pub fn validate_cpu_limit(value: f32) -> Result<f32, LimitError> {
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(LimitError::CpuOutOfRange(value))
    }
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
