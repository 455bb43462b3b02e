// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `apps:` manifest.
//!
//! File keys are snake_case; they are validated and folded into the
//! camelCase [`ProcessSpec`] the engine consumes. Validation is strict:
//! a manifest that parses but carries a bad limit, port, or duplicate
//! name is rejected as a whole rather than partially started.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::{parse_memory_limit, validate_cpu_limit, LimitError, ProcessSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("manifest has no apps")]
    NoApps,

    #[error("app '{app}': name must not be empty")]
    EmptyName { app: usize },

    #[error("duplicate app name '{0}'")]
    DuplicateName(String),

    #[error("app '{app}': {source}")]
    Limit {
        app: String,
        #[source]
        source: LimitError,
    },

    #[error("app '{app}': instances must be >= 1 or \"auto\"")]
    InvalidInstances { app: String },

    #[error("app '{app}': metrics_port {port} out of range (1-65535)")]
    InvalidPort { app: String, port: u64 },

    #[error("app '{app}': health_check '{url}' is not an http(s) URL")]
    InvalidUrl { app: String, url: String },
}

/// Instance count: a number or `auto`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Instances {
    Count(u64),
    Keyword(String),
}

impl Default for Instances {
    fn default() -> Self {
        Self::Count(1)
    }
}

/// One app block, file-shaped.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
    pub script: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub instances: Instances,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub watch_ignore: Vec<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<f32>,
    #[serde(default)]
    pub restart_delay: Option<u64>,
    #[serde(default)]
    pub max_restarts: Option<u32>,
    #[serde(default)]
    pub health_check: Option<String>,
    #[serde(default)]
    pub log_format: Option<warden_core::LogFormat>,
    #[serde(default)]
    pub log_output: Option<warden_core::LogOutput>,
    #[serde(default)]
    pub metrics_port: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    apps: Vec<AppConfig>,
}

/// A validated app ready to hand to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSpec {
    pub name: String,
    pub spec: ProcessSpec,
}

/// Read and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<NamedSpec>, ConfigError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    parse_manifest(&text)
}

/// Validate manifest text.
pub fn parse_manifest(text: &str) -> Result<Vec<NamedSpec>, ConfigError> {
    let manifest: Manifest = serde_yaml::from_str(text)?;
    if manifest.apps.is_empty() {
        return Err(ConfigError::NoApps);
    }

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(manifest.apps.len());
    for (index, app) in manifest.apps.into_iter().enumerate() {
        if app.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { app: index });
        }
        if !seen.insert(app.name.clone()) {
            return Err(ConfigError::DuplicateName(app.name));
        }
        specs.push(validate_app(app)?);
    }
    Ok(specs)
}

fn validate_app(app: AppConfig) -> Result<NamedSpec, ConfigError> {
    let name = app.name.clone();

    let instances = match &app.instances {
        Instances::Count(n) if *n >= 1 => *n as u32,
        Instances::Keyword(kw) if kw.eq_ignore_ascii_case("auto") => {
            // Cluster mode is out of scope; `auto` degrades to one instance.
            1
        }
        _ => return Err(ConfigError::InvalidInstances { app: name }),
    };

    let memory_limit_bytes = app
        .memory_limit
        .as_deref()
        .map(parse_memory_limit)
        .transpose()
        .map_err(|source| ConfigError::Limit {
            app: name.clone(),
            source,
        })?;

    let cpu_limit_percent = app
        .cpu_limit
        .map(validate_cpu_limit)
        .transpose()
        .map_err(|source| ConfigError::Limit {
            app: name.clone(),
            source,
        })?;

    let metrics_port = match app.metrics_port {
        None => None,
        Some(port @ 1..=65_535) => Some(port as u16),
        Some(port) => return Err(ConfigError::InvalidPort { app: name, port }),
    };

    if let Some(url) = &app.health_check {
        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"));
        if !rest.is_some_and(|host| !host.is_empty()) {
            return Err(ConfigError::InvalidUrl {
                app: name,
                url: url.clone(),
            });
        }
    }

    let mut spec = ProcessSpec::for_script(app.script);
    spec.args = app.args;
    spec.cwd = app.cwd;
    spec.env = app.env;
    if let Some(interpreter) = app.interpreter {
        spec.interpreter = interpreter;
    }
    spec.instances = instances;
    spec.watch = app.watch;
    spec.watch_ignore = app.watch_ignore;
    spec.memory_limit_bytes = memory_limit_bytes;
    spec.cpu_limit_percent = cpu_limit_percent;
    if let Some(delay) = app.restart_delay {
        spec.restart_delay_ms = delay;
    }
    if let Some(max) = app.max_restarts {
        spec.max_restarts = max;
    }
    spec.health_check = app.health_check;
    if let Some(format) = app.log_format {
        spec.log_format = format;
    }
    if let Some(output) = app.log_output {
        spec.log_output = output;
    }
    spec.metrics_port = metrics_port;

    Ok(NamedSpec {
        name: app.name,
        spec,
    })
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
