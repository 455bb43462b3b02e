// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control plane: accepts local connections, decodes framed commands,
//! and dispatches them onto the supervisor's queue.
//!
//! Per connection, requests are handled strictly in order — the handler
//! awaits each command's committed outcome before reading the next frame,
//! which is what makes pipelining safe.

use crate::protocol::{self, Reply, Request, RequestOptions};
use crate::service;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use warden_core::{parse_memory_limit, validate_cpu_limit, ProcessSpec};
use warden_engine::{Command, CommandOutcome, SupervisorHandle, Target};

/// Default tail length for the `logs` action.
const DEFAULT_LOG_LINES: usize = 20;

/// Shared context for connection handlers.
pub struct ListenCtx {
    pub supervisor: SupervisorHandle,
    pub shutdown: Arc<Notify>,
}

/// Accept loop. Runs until the daemon shuts down.
pub struct ControlPlane {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl ControlPlane {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    ctx: &ListenCtx,
) -> Result<(), protocol::ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request: Request = match protocol::read_frame(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(protocol::ProtocolError::Json(e)) => {
                // The stream is still framed; answer the bad line and go on.
                warn!(error = %e, "malformed request frame");
                protocol::write_frame(&mut write_half, &Reply::err(format!("Invalid request: {e}")))
                    .await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!(action = %request.action, target = ?request.target, "request");
        let reply = dispatch(request, ctx).await;
        protocol::write_frame(&mut write_half, &reply).await?;
    }
}

/// Route one request to the supervisor and shape the reply.
pub(crate) async fn dispatch(request: Request, ctx: &ListenCtx) -> Reply {
    let Request {
        action,
        target,
        options,
    } = request;

    match action.as_str() {
        "ping" => Reply::ok("pong"),

        "start" => handle_start(ctx, target, options).await,

        "stop" => match parse_target(target, "stop") {
            Ok(target) => match ctx.supervisor.command(Command::Stop { target }).await {
                Ok(CommandOutcome::Stopped { names }) => stopped_reply("stopped", &names),
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            },
            Err(reply) => reply,
        },

        "restart" => match parse_target(target, "restart") {
            Ok(target) => match ctx.supervisor.command(Command::Restart { target }).await {
                Ok(CommandOutcome::Restarted { views, pending }) => {
                    let data = serde_json::to_value(&views).ok();
                    let message = match (views.len(), pending.len()) {
                        (1, 0) => format!(
                            "Process restarted: {} ({})",
                            views[0].entry.name, views[0].entry.id
                        ),
                        (v, p) => format!("Restarted {v} processes, {p} restarting"),
                    };
                    Reply {
                        success: true,
                        message,
                        data,
                    }
                }
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            },
            Err(reply) => reply,
        },

        "status" => {
            let target = target.filter(|t| t != "all");
            match ctx.supervisor.command(Command::Status { target }).await {
                Ok(CommandOutcome::StatusList(views)) => match serde_json::to_value(&views) {
                    Ok(data) => Reply::ok_with(format!("{} processes", views.len()), data),
                    Err(e) => Reply::err(e.to_string()),
                },
                Ok(CommandOutcome::StatusDetail(detail)) => match serde_json::to_value(&detail) {
                    Ok(data) => Reply::ok_with(
                        format!("{} ({})", detail.view.entry.name, detail.view.entry.id),
                        data,
                    ),
                    Err(e) => Reply::err(e.to_string()),
                },
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            }
        }

        "logs" => {
            let Some(target) = target else {
                return Reply::err("logs requires a process id or name");
            };
            let lines = options.lines.unwrap_or(DEFAULT_LOG_LINES);
            match ctx
                .supervisor
                .command(Command::Logs { target, lines })
                .await
            {
                Ok(CommandOutcome::Logs { name, lines }) => {
                    let data = serde_json::json!({ "name": name, "lines": lines });
                    Reply::ok_with(format!("Logs for {name}"), data)
                }
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            }
        }

        "save" => match ctx.supervisor.command(Command::Save).await {
            Ok(CommandOutcome::Saved) => Reply::ok("State saved"),
            Ok(other) => unexpected(other),
            Err(e) => Reply::err(e.to_string()),
        },

        "delete" => match parse_target(target, "delete") {
            Ok(target) => match ctx.supervisor.command(Command::Delete { target }).await {
                Ok(CommandOutcome::Deleted { names }) => stopped_reply("deleted", &names),
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            },
            Err(reply) => reply,
        },

        "startup" => match service::install() {
            Ok(message) => Reply::ok(message),
            Err(e) => Reply::err(e.to_string()),
        },

        "unstartup" => match service::uninstall() {
            Ok(message) => Reply::ok(message),
            Err(e) => Reply::err(e.to_string()),
        },

        "shutdown" => {
            // Used by the CLI-spawned daemon's own tooling and tests.
            let reply = match ctx.supervisor.command(Command::Shutdown).await {
                Ok(CommandOutcome::ShuttingDown) => Reply::ok("Daemon shutting down"),
                Ok(other) => unexpected(other),
                Err(e) => Reply::err(e.to_string()),
            };
            ctx.shutdown.notify_one();
            reply
        }

        other => Reply::err(format!("Unknown command: {other}")),
    }
}

async fn handle_start(ctx: &ListenCtx, target: Option<String>, options: RequestOptions) -> Reply {
    let Some(script) = target else {
        return Reply::err("start requires a script path");
    };

    let (name, spec) = match build_spec(script, options) {
        Ok(pair) => pair,
        Err(message) => return Reply::err(message),
    };

    match ctx.supervisor.command(Command::Start { name, spec }).await {
        Ok(CommandOutcome::Started(view)) => {
            info!(name = %view.entry.name, id = %view.entry.id, "started via control plane");
            let message = format!("Process started: {} ({})", view.entry.name, view.entry.id);
            match serde_json::to_value(&view) {
                Ok(data) => Reply::ok_with(message, data),
                Err(e) => Reply::err(e.to_string()),
            }
        }
        Ok(other) => unexpected(other),
        Err(e) => Reply::err(e.to_string()),
    }
}

/// Fold wire options into a [`ProcessSpec`].
fn build_spec(
    script: String,
    options: RequestOptions,
) -> Result<(Option<String>, ProcessSpec), String> {
    let mut spec = ProcessSpec::for_script(script);

    spec.args = options.args;
    spec.cwd = options.cwd;
    if let Some(interpreter) = options.interpreter {
        spec.interpreter = interpreter;
    }
    spec.watch = options.watch;
    spec.watch_ignore = options.watch_ignore;

    for pair in &options.env {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("invalid env entry '{pair}' (expected KEY=VALUE)"));
        };
        spec.env.insert(key.to_string(), value.to_string());
    }

    if let Some(limit) = &options.memory_limit {
        spec.memory_limit_bytes = Some(parse_memory_limit(limit).map_err(|e| e.to_string())?);
    }
    if let Some(limit) = options.cpu_limit {
        spec.cpu_limit_percent = Some(validate_cpu_limit(limit).map_err(|e| e.to_string())?);
    }
    if let Some(delay) = options.restart_delay {
        spec.restart_delay_ms = delay;
    }
    if let Some(max) = options.max_restarts {
        spec.max_restarts = max;
    }
    spec.health_check = options.health_check;
    if let Some(format) = options.log_format {
        spec.log_format = format;
    }
    if let Some(output) = options.log_output {
        spec.log_output = output;
    }

    Ok((options.name, spec))
}

fn parse_target(target: Option<String>, action: &str) -> Result<Target, Reply> {
    match target {
        Some(t) if t == "all" => Ok(Target::All),
        Some(t) => Ok(Target::One(t)),
        None => Err(Reply::err(format!("{action} requires a target"))),
    }
}

fn stopped_reply(verb: &str, names: &[String]) -> Reply {
    let message = match names {
        [] => format!("No processes {verb}"),
        [one] => format!("Process {verb}: {one}"),
        many => format!("{} processes {verb}", many.len()),
    };
    Reply::ok_with(message, serde_json::json!({ "names": names }))
}

fn unexpected(outcome: CommandOutcome) -> Reply {
    Reply::err(format!("unexpected outcome: {outcome:?}"))
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
