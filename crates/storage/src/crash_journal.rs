// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-entry crash records.
//!
//! Each entry gets `<data>/crashes/<id>.json`, a JSON array trimmed to the
//! newest [`MAX_RECORDS`] records. Records are appended read-modify-write;
//! journals are small (≤100 records) so the rewrite cost is irrelevant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::EntryId;

/// Newest records kept per entry.
pub const MAX_RECORDS: usize = 100;

/// Window for the "recent crashes" statistic.
const RECENT_WINDOW_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    /// Epoch ms of the crash.
    pub timestamp: u64,
    pub id: EntryId,
    pub name: String,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub signal: Option<i32>,
    /// Last sampled CPU before exit.
    #[serde(default)]
    pub cpu_percent: f32,
    /// Last sampled RSS before exit.
    #[serde(default)]
    pub rss_bytes: u64,
    pub uptime_ms: u64,
    pub restart_count: u32,
}

/// Aggregate view over an entry's journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashStats {
    pub total: usize,
    /// Crashes within the last 60 seconds.
    pub last_minute: usize,
    /// Most frequent exit code, if any crash carried one.
    pub modal_exit_code: Option<i32>,
    pub mean_uptime_ms: u64,
    /// Chronological tail (oldest first) of the newest records.
    pub recent: Vec<CrashRecord>,
}

/// Handle on the crash journal directory.
#[derive(Debug, Clone)]
pub struct CrashJournal {
    dir: PathBuf,
}

impl CrashJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &EntryId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Append a record, trimming to the newest [`MAX_RECORDS`].
    pub fn append(&self, record: CrashRecord) -> Result<(), JournalError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&record.id);

        let mut records = read_records(&path)?;
        records.push(record);
        if records.len() > MAX_RECORDS {
            let excess = records.len() - MAX_RECORDS;
            records.drain(..excess);
        }

        let json = serde_json::to_vec_pretty(&records)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// All records for an entry, oldest first. Missing journal reads empty.
    pub fn load(&self, id: &EntryId) -> Result<Vec<CrashRecord>, JournalError> {
        read_records(&self.path_for(id))
    }

    /// Aggregate statistics with a tail of the last `tail_len` records.
    pub fn stats(
        &self,
        id: &EntryId,
        now_ms: u64,
        tail_len: usize,
    ) -> Result<CrashStats, JournalError> {
        let records = self.load(id)?;

        let last_minute = records
            .iter()
            .filter(|r| now_ms.saturating_sub(r.timestamp) <= RECENT_WINDOW_MS)
            .count();

        let mut code_counts: HashMap<i32, usize> = HashMap::new();
        for r in &records {
            if let Some(code) = r.exit_code {
                *code_counts.entry(code).or_insert(0) += 1;
            }
        }
        // Ties break toward the smaller code for determinism.
        let modal_exit_code = code_counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(code, _)| code);

        let mean_uptime_ms = if records.is_empty() {
            0
        } else {
            records.iter().map(|r| r.uptime_ms).sum::<u64>() / records.len() as u64
        };

        let start = records.len().saturating_sub(tail_len);
        let recent = records[start..].to_vec();

        Ok(CrashStats {
            total: records.len(),
            last_minute,
            modal_exit_code,
            mean_uptime_ms,
            recent,
        })
    }

    /// Drop an entry's journal. Missing journal is fine.
    pub fn remove(&self, id: &EntryId) -> Result<(), JournalError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<CrashRecord>, JournalError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "crash_journal_tests.rs"]
mod tests;
