// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-change watching with trailing-edge debounce.
//!
//! Watches the directory of an entry's script recursively. Raw notify
//! events are filtered against the ignore set, then coalesced: the
//! `change` event fires once, a debounce interval after the *last* raw
//! event in a burst.

use crate::supervisor::EventSender;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use warden_core::{EntryId, Event};

/// Patterns ignored for every watched entry.
const BUILTIN_IGNORES: &[&str] = &["node_modules", ".git", "logs", "*.log"];

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid watch-ignore pattern '{pattern}': {message}")]
    BadPattern { pattern: String, message: String },

    #[error("failed to watch {path}: {message}")]
    WatchFailed { path: PathBuf, message: String },
}

/// Compiled ignore patterns plus the supervisor's own data directory.
#[derive(Debug)]
pub struct IgnoreSet {
    globs: GlobSet,
    data_dir: PathBuf,
}

impl IgnoreSet {
    /// Union of the built-in patterns and `extra` spec-supplied ones.
    ///
    /// Each pattern is matched against individual path components as well
    /// as whole paths, so `node_modules` prunes any nested directory of
    /// that name the way users expect.
    pub fn build(extra: &[String], data_dir: &Path) -> Result<Self, WatchError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in BUILTIN_IGNORES
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().cloned())
        {
            for expanded in [
                pattern.clone(),
                format!("**/{pattern}"),
                format!("**/{pattern}/**"),
            ] {
                let glob = Glob::new(&expanded).map_err(|e| WatchError::BadPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                builder.add(glob);
            }
        }
        let globs = builder.build().map_err(|e| WatchError::BadPattern {
            pattern: String::new(),
            message: e.to_string(),
        })?;

        Ok(Self {
            globs,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.starts_with(&self.data_dir) || self.globs.is_match(path)
    }
}

/// Handle to a running watcher task. The notify watcher lives inside the
/// task, so aborting it releases the OS watches.
pub(crate) struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Watch `dir` recursively and deliver debounced change events for `id`.
pub(crate) fn spawn_watcher(
    id: EntryId,
    dir: PathBuf,
    ignores: IgnoreSet,
    debounce: Duration,
    events: EventSender,
) -> Result<WatcherHandle, WatchError> {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();

    // The notify callback runs on notify's own thread; an unbounded
    // sender is safe to use from there.
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
            match result {
                Ok(event) if is_mutation(&event.kind) => {
                    for path in event.paths {
                        let _ = raw_tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "watch backend error"),
            }
        })
        .map_err(|e| WatchError::WatchFailed {
            path: dir.clone(),
            message: e.to_string(),
        })?;

    watcher
        .watch(&dir, RecursiveMode::Recursive)
        .map_err(|e| WatchError::WatchFailed {
            path: dir.clone(),
            message: e.to_string(),
        })?;

    let task = tokio::spawn(debounce_loop(id, dir, watcher, raw_rx, ignores, debounce, events));
    Ok(WatcherHandle { task })
}

async fn debounce_loop(
    id: EntryId,
    dir: PathBuf,
    watcher: RecommendedWatcher,
    mut raw_rx: mpsc::UnboundedReceiver<PathBuf>,
    ignores: IgnoreSet,
    debounce: Duration,
    events: EventSender,
) {
    // Keep the OS watches alive for the lifetime of this task.
    let _watcher = watcher;

    loop {
        let Some(first) = next_relevant(&mut raw_rx, &ignores).await else {
            return;
        };
        debug!(entry = %id, path = %first.display(), "file change, debouncing");

        // Trailing edge: every further relevant event restarts the wait.
        loop {
            match tokio::time::timeout(debounce, next_relevant(&mut raw_rx, &ignores)).await {
                Ok(Some(_)) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        debug!(entry = %id, dir = %dir.display(), "debounce settled, emitting change");
        events.send(Event::FileChange { id: id.clone() });
    }
}

async fn next_relevant(
    rx: &mut mpsc::UnboundedReceiver<PathBuf>,
    ignores: &IgnoreSet,
) -> Option<PathBuf> {
    loop {
        let path = rx.recv().await?;
        if !ignores.matches(&path) {
            return Some(path);
        }
    }
}

/// Creates, modifications, and deletions count; access and metadata-only
/// chatter does not.
fn is_mutation(kind: &notify::EventKind) -> bool {
    use notify::EventKind;
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
