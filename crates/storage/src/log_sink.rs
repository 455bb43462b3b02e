// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-entry capture of child output.
//!
//! Each chunk from the child's stdout/stderr is framed (text or JSON) and
//! appended to `<data>/logs/<id>/app.log`, or echoed to the supervisor's
//! own stdout when the spec asks for it. Size-based rotation keeps the
//! current file plus [`MAX_LOG_FILES`] historical files.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::{EntryId, LogFormat, LogOutput};

/// Rotation threshold for the current file.
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Historical files kept after rotation (`app.log.1` .. `app.log.5`).
pub const MAX_LOG_FILES: u32 = 5;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which child pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    fn level(self) -> &'static str {
        match self {
            Self::Stdout => "INFO",
            Self::Stderr => "ERROR",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFrame<'a> {
    timestamp: String,
    level: &'a str,
    process_id: &'a str,
    process_name: &'a str,
    message: &'a str,
}

/// Append handle for one entry's captured output.
pub struct LogSink {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    max_size: u64,
    format: LogFormat,
    output: LogOutput,
    id: EntryId,
    name: String,
}

impl LogSink {
    /// Open (creating as needed) the sink for an entry.
    pub fn open(
        logs_root: &Path,
        id: &EntryId,
        name: &str,
        format: LogFormat,
        output: LogOutput,
    ) -> Result<Self, SinkError> {
        let dir = logs_root.join(id.as_str());
        let path = dir.join("app.log");

        let (file, size) = match output {
            LogOutput::Stdout => (None, 0),
            LogOutput::File => {
                fs::create_dir_all(&dir)?;
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                let size = file.metadata()?.len();
                (Some(file), size)
            }
        };

        Ok(Self {
            path,
            file,
            size,
            max_size: MAX_LOG_SIZE,
            format,
            output,
            id: id.clone(),
            name: name.to_string(),
        })
    }

    /// Override the rotation threshold (tests).
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Frame and write one chunk.
    pub fn write(&mut self, stream: LogStream, chunk: &str) -> Result<(), SinkError> {
        let framed = self.frame(stream, chunk, Utc::now())?;

        match self.output {
            LogOutput::Stdout => {
                // The daemon's own stdout is the destination by contract.
                print!("{framed}");
                Ok(())
            }
            LogOutput::File => {
                if let Some(file) = self.file.as_mut() {
                    file.write_all(framed.as_bytes())?;
                    self.size += framed.len() as u64;
                    if self.size >= self.max_size {
                        self.rotate()?;
                    }
                }
                Ok(())
            }
        }
    }

    fn frame(
        &self,
        stream: LogStream,
        chunk: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SinkError> {
        match self.format {
            LogFormat::Text => Ok(frame_text(stream, &self.name, chunk, now)),
            LogFormat::Json => frame_json(stream, &self.id, &self.name, chunk, now),
        }
    }

    /// Shift `app.log.N` up, retire the overflow, start a fresh `app.log`.
    fn rotate(&mut self) -> Result<(), SinkError> {
        self.file = None;

        let name = |n: u32| -> PathBuf {
            let mut s = self.path.as_os_str().to_os_string();
            s.push(format!(".{n}"));
            PathBuf::from(s)
        };

        let overflow = name(MAX_LOG_FILES);
        if overflow.exists() {
            let _ = fs::remove_file(&overflow);
        }
        for n in (1..MAX_LOG_FILES).rev() {
            let src = name(n);
            if src.exists() {
                let _ = fs::rename(&src, name(n + 1));
            }
        }
        fs::rename(&self.path, name(1))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.size = 0;
        Ok(())
    }

    /// Last `n` non-empty lines of an entry's current log file.
    ///
    /// Independent of any open sink so the control plane can serve `logs`
    /// without touching the writer.
    pub fn tail(logs_root: &Path, id: &EntryId, n: usize) -> Result<Vec<String>, SinkError> {
        let path = logs_root.join(id.as_str()).join("app.log");
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].iter().map(|s| s.to_string()).collect())
    }
}

/// `[<ISO8601>] [<LEVEL>] [<name>] <chunk>`, newline-terminated.
pub fn frame_text(stream: LogStream, name: &str, chunk: &str, now: DateTime<Utc>) -> String {
    let ts = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let newline = if chunk.ends_with('\n') { "" } else { "\n" };
    format!("[{ts}] [{}] [{name}] {chunk}{newline}", stream.level())
}

/// One JSON object per line.
pub fn frame_json(
    stream: LogStream,
    id: &EntryId,
    name: &str,
    chunk: &str,
    now: DateTime<Utc>,
) -> Result<String, SinkError> {
    let frame = JsonFrame {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        level: stream.level(),
        process_id: id.as_str(),
        process_name: name,
        message: chunk.trim_end_matches('\n'),
    };
    let mut line = serde_json::to_string(&frame)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
#[path = "log_sink_tests.rs"]
mod tests;
