// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry snapshot persistence.
//!
//! One JSON file holds every entry. Writes go through a temp file and an
//! atomic rename so readers (including the next daemon) see either the old
//! or the new snapshot, never a torn one. A snapshot that fails to parse is
//! quarantined as `<file>.backup` rather than blocking startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;
use tracing::warn;
use warden_core::Entry;

/// Bumped when the snapshot schema changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted serialization of the registry at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// When this snapshot was created
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<Entry>,
}

impl Snapshot {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            timestamp: Utc::now(),
            entries,
        }
    }

    /// Save the snapshot atomically (write to `.tmp`, then rename).
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = sibling_path(path, ".tmp");

        // Write to temp file and sync
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load the snapshot if present.
    ///
    /// Returns `Ok(None)` when the file does not exist. A file that exists
    /// but does not parse is renamed to `<file>.backup` and `Ok(None)` is
    /// returned, so the daemon starts with an empty registry instead of
    /// refusing to boot.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let backup = sibling_path(path, ".backup");
                warn!(
                    error = %e,
                    path = %path.display(),
                    backup = %backup.display(),
                    "corrupt snapshot, quarantining and starting empty",
                );
                fs::rename(path, &backup)?;
                Ok(None)
            }
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    std::path::PathBuf::from(s)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
