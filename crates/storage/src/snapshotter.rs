// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced background persistence of the registry.
//!
//! `mark_dirty()` is cheap and non-blocking; the writer task waits for a
//! quiescent interval so a burst of mutations coalesces into one write.
//! Write failures are logged and swallowed — persistence must never
//! destabilize the supervisor.

use crate::snapshot::{Snapshot, SnapshotError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Msg {
    Dirty,
    Flush(oneshot::Sender<Result<(), String>>),
}

/// Handle to the background snapshot writer.
#[derive(Clone)]
pub struct Snapshotter {
    tx: mpsc::UnboundedSender<Msg>,
}

impl Snapshotter {
    /// Spawn the writer task.
    ///
    /// `producer` is called on the writer task each time a write is due; it
    /// must capture whatever shared handle it needs to observe the registry.
    pub fn spawn<F>(path: PathBuf, quiesce: Duration, producer: F) -> Self
    where
        F: Fn() -> Snapshot + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(path, quiesce, producer, rx));
        Self { tx }
    }

    /// Schedule a write after the quiescent interval. Never blocks.
    pub fn mark_dirty(&self) {
        let _ = self.tx.send(Msg::Dirty);
    }

    /// Write immediately, bypassing the debounce. Used by the `save`
    /// command and daemon shutdown.
    pub async fn flush(&self) -> Result<(), String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(reply_tx)).is_err() {
            return Err("snapshot writer is gone".to_string());
        }
        reply_rx
            .await
            .unwrap_or_else(|_| Err("snapshot writer dropped the request".to_string()))
    }
}

async fn run<F>(path: PathBuf, quiesce: Duration, producer: F, mut rx: mpsc::UnboundedReceiver<Msg>)
where
    F: Fn() -> Snapshot + Send + 'static,
{
    while let Some(msg) = rx.recv().await {
        match msg {
            Msg::Flush(reply) => {
                let _ = reply.send(write(&path, &producer).map_err(|e| e.to_string()));
            }
            Msg::Dirty => {
                // Trailing-edge debounce: keep extending while marks arrive
                // within the quiescent interval. A flush request cuts the
                // wait short and satisfies the pending dirty state too.
                let mut pending_flush: Option<oneshot::Sender<Result<(), String>>> = None;
                loop {
                    match tokio::time::timeout(quiesce, rx.recv()).await {
                        Ok(Some(Msg::Dirty)) => continue,
                        Ok(Some(Msg::Flush(reply))) => {
                            pending_flush = Some(reply);
                            break;
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                let result = write(&path, &producer);
                if let Err(e) = &result {
                    warn!(error = %e, path = %path.display(), "snapshot write failed");
                }
                if let Some(reply) = pending_flush {
                    let _ = reply.send(result.map_err(|e| e.to_string()));
                }
            }
        }
    }
}

fn write<F>(path: &std::path::Path, producer: &F) -> Result<(), SnapshotError>
where
    F: Fn() -> Snapshot,
{
    let snapshot = producer();
    snapshot.save(path)?;
    debug!(
        path = %path.display(),
        entries = snapshot.entries.len(),
        "snapshot written"
    );
    Ok(())
}

#[cfg(test)]
#[path = "snapshotter_tests.rs"]
mod tests;
