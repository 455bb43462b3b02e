// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: one local stream, newline-framed JSON, hard timeout.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use warden_daemon::protocol::{self, Reply, Request};

/// Client-side ceiling per request; the server has none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for a freshly spawned daemon to accept connections.
const START_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon is not running (socket {0})")]
    DaemonNotRunning(PathBuf),

    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("timed out waiting for the daemon to start")]
    DaemonStartTimeout,

    #[error("request timed out after {}s", REQUEST_TIMEOUT.as_secs())]
    Timeout,

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DaemonClient {
    stream: BufReader<UnixStream>,
}

/// Socket path, honoring the same override the daemon uses.
pub fn socket_path() -> PathBuf {
    match std::env::var_os("WARDEN_SOCKET") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from("/tmp/warden.sock"),
    }
}

impl DaemonClient {
    /// Connect to a running daemon; never starts one.
    pub async fn connect() -> Result<Self, ClientError> {
        let path = socket_path();
        match UnixStream::connect(&path).await {
            Ok(stream) => Ok(Self {
                stream: BufReader::new(stream),
            }),
            Err(_) => Err(ClientError::DaemonNotRunning(path)),
        }
    }

    /// Connect, spawning the daemon in the background if needed.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        if let Ok(client) = Self::connect().await {
            return Ok(client);
        }

        spawn_daemon()?;

        let deadline = tokio::time::Instant::now() + START_TIMEOUT;
        loop {
            if let Ok(client) = Self::connect().await {
                return Ok(client);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::DaemonStartTimeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Send one request and wait for its reply, bounded by the client
    /// timeout. Requests on one client are answered strictly in order, so
    /// several calls may be issued back to back on the same stream.
    pub async fn request(&mut self, request: &Request) -> Result<Reply, ClientError> {
        tokio::time::timeout(REQUEST_TIMEOUT, self.exchange(request))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn exchange(&mut self, request: &Request) -> Result<Reply, ClientError> {
        protocol::write_frame(self.stream.get_mut(), request).await?;
        match protocol::read_frame(&mut self.stream).await? {
            Some(reply) => Ok(reply),
            None => Err(ClientError::ConnectionClosed),
        }
    }
}

/// Spawn `wardend` detached, stdio discarded.
fn spawn_daemon() -> Result<(), ClientError> {
    let binary = find_daemon_binary();
    std::process::Command::new(&binary)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {e}", binary.display())))
}

/// Locate the daemon binary: explicit override, then a sibling of this
/// executable, then `$PATH`.
fn find_daemon_binary() -> PathBuf {
    if let Some(path) = std::env::var_os("WARDEN_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join("wardend");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("wardend")
}
