// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! YAML app-manifest parsing and validation

mod manifest;

pub use manifest::{load_manifest, parse_manifest, AppConfig, ConfigError, Instances, NamedSpec};
