// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format for the local control channel.
//!
//! One UTF-8 JSON object per `\n`-terminated line, both directions.
//! Requests are `{action, target?, options?}`; replies are
//! `{success, message, data?}`. Multiple requests may be pipelined on one
//! stream; the listener answers them strictly in order.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use warden_core::{LogFormat, LogOutput};

/// Ceiling on a single frame. Generous: the largest legitimate frame is a
/// status reply for a big registry.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame exceeds {MAX_FRAME_SIZE} bytes")]
    FrameTooLarge,
}

/// A framed command from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Per-action options. Everything is optional; actions validate what they
/// need and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    pub name: Option<String>,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// `KEY=VALUE` pairs overlaid on the daemon environment.
    pub env: Vec<String>,
    pub interpreter: Option<String>,
    pub watch: bool,
    pub watch_ignore: Vec<String>,
    pub memory_limit: Option<String>,
    pub cpu_limit: Option<f32>,
    pub restart_delay: Option<u64>,
    pub max_restarts: Option<u32>,
    pub health_check: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_output: Option<LogOutput>,
    /// For `logs`: how many lines to tail.
    pub lines: Option<usize>,
}

/// A framed reply to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Read one newline-terminated frame. `Ok(None)` means a clean EOF
/// between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufReadExt + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if line.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge);
        }
        if line.trim().is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(line.trim())?));
    }
}

/// Write one frame followed by `\n`.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(frame)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge);
    }
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
