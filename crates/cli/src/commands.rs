// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers: build requests, render replies, map exit codes.

use crate::client::{ClientError, DaemonClient};
use crate::output;
use crate::{Commands, EXIT_SERVER_FAILURE};
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use warden_core::{LogFormat, LogOutput};
use warden_daemon::protocol::{Reply, Request, RequestOptions};

#[derive(Args)]
pub struct StartArgs {
    /// Script to run (omit when using --config)
    pub script: Option<PathBuf>,

    /// Start every app declared in a YAML manifest
    #[arg(long, value_name = "FILE", conflicts_with = "script")]
    pub config: Option<PathBuf>,

    /// Process name (defaults to the script's file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Arguments passed to the script
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Working directory (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// KEY=VALUE environment overlay, repeatable
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Runtime the script is handed to (default: node)
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Restart when files near the script change
    #[arg(long)]
    pub watch: bool,

    /// Extra ignore pattern for --watch, repeatable
    #[arg(long = "watch-ignore", value_name = "PATTERN")]
    pub watch_ignore: Vec<String>,

    /// Memory ceiling, e.g. 512mb
    #[arg(long, value_name = "SIZE")]
    pub memory_limit: Option<String>,

    /// CPU ceiling in percent (0-100)
    #[arg(long, value_name = "PCT")]
    pub cpu_limit: Option<f32>,

    /// Minimum delay between automatic restarts, in ms
    #[arg(long, value_name = "MS")]
    pub restart_delay: Option<u64>,

    /// Consecutive failed restarts tolerated before giving up
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// Readiness URL probed after start
    #[arg(long, value_name = "URL")]
    pub health_check: Option<String>,

    /// Log framing: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log destination: file or stdout
    #[arg(long, value_name = "DEST")]
    pub log_output: Option<String>,
}

pub async fn run(command: Commands) -> Result<i32, ClientError> {
    match command {
        Commands::Start(args) => start(args).await,
        Commands::Stop { target } => {
            simple(Request {
                action: "stop".into(),
                target: Some(target),
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Restart { target } => {
            simple(Request {
                action: "restart".into(),
                target: Some(target),
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Status { target } => status(target).await,
        Commands::Logs { target, lines } => logs(target, lines).await,
        Commands::Save => {
            simple(Request {
                action: "save".into(),
                target: None,
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Delete { target } => {
            simple(Request {
                action: "delete".into(),
                target: Some(target),
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Startup => {
            simple(Request {
                action: "startup".into(),
                target: None,
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Unstartup => {
            simple(Request {
                action: "unstartup".into(),
                target: None,
                options: RequestOptions::default(),
            })
            .await
        }
        Commands::Ping => {
            let mut client = DaemonClient::connect().await?;
            let reply = client
                .request(&Request {
                    action: "ping".into(),
                    target: None,
                    options: RequestOptions::default(),
                })
                .await?;
            Ok(finish(reply))
        }
    }
}

/// Send one request on a fresh connection and render the reply.
async fn simple(request: Request) -> Result<i32, ClientError> {
    let mut client = DaemonClient::connect().await?;
    let reply = client.request(&request).await?;
    Ok(finish(reply))
}

async fn start(args: StartArgs) -> Result<i32, ClientError> {
    let requests = match build_start_requests(args) {
        Ok(requests) => requests,
        Err(message) => {
            eprintln!("error: {message}");
            return Ok(EXIT_SERVER_FAILURE);
        }
    };

    // Starting is the entry point: bring the daemon up if needed.
    let mut client = DaemonClient::connect_or_start().await?;

    let mut code = 0;
    for request in requests {
        let reply = client.request(&request).await?;
        let this = finish(reply);
        if this != 0 {
            code = this;
        }
    }
    Ok(code)
}

/// One request per app: a plain script start, or the whole manifest.
fn build_start_requests(args: StartArgs) -> Result<Vec<Request>, String> {
    if let Some(manifest_path) = args.config {
        let apps = warden_config::load_manifest(&manifest_path).map_err(|e| e.to_string())?;
        let invoke_dir = current_dir();
        return Ok(apps
            .into_iter()
            .map(|app| manifest_request(app, invoke_dir.clone()))
            .collect());
    }

    let Some(script) = args.script else {
        return Err("either a script or --config is required".to_string());
    };

    validate_choice(&args.log_format, &["text", "json"], "--log-format")?;
    validate_choice(&args.log_output, &["file", "stdout"], "--log-output")?;

    let options = RequestOptions {
        name: args.name,
        args: args.args,
        cwd: args.cwd.or_else(|| Some(current_dir())),
        env: args.env,
        interpreter: args.interpreter,
        watch: args.watch,
        watch_ignore: args.watch_ignore,
        memory_limit: args.memory_limit,
        cpu_limit: args.cpu_limit,
        restart_delay: args.restart_delay,
        max_restarts: args.max_restarts,
        health_check: args.health_check,
        log_format: args.log_format.as_deref().and_then(parse_log_format),
        log_output: args.log_output.as_deref().and_then(parse_log_output),
        lines: None,
    };

    Ok(vec![Request {
        action: "start".into(),
        target: Some(script.to_string_lossy().into_owned()),
        options,
    }])
}

/// Fold a validated manifest app into wire options.
fn manifest_request(app: warden_config::NamedSpec, invoke_dir: PathBuf) -> Request {
    let spec = app.spec;
    let env: Vec<String> = {
        let map: HashMap<String, String> = spec.env;
        let mut pairs: Vec<String> = map.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        pairs
    };

    let options = RequestOptions {
        name: Some(app.name),
        args: spec.args,
        cwd: spec.cwd.or(Some(invoke_dir)),
        env,
        interpreter: Some(spec.interpreter),
        watch: spec.watch,
        watch_ignore: spec.watch_ignore,
        // Already validated; bytes round-trip through the daemon parser.
        memory_limit: spec.memory_limit_bytes.map(|b| format!("{b}b")),
        cpu_limit: spec.cpu_limit_percent,
        restart_delay: Some(spec.restart_delay_ms),
        max_restarts: Some(spec.max_restarts),
        health_check: spec.health_check,
        log_format: Some(spec.log_format),
        log_output: Some(spec.log_output),
        lines: None,
    };

    Request {
        action: "start".into(),
        target: Some(spec.script.to_string_lossy().into_owned()),
        options,
    }
}

async fn status(target: Option<String>) -> Result<i32, ClientError> {
    let mut client = DaemonClient::connect().await?;
    let reply = client
        .request(&Request {
            action: "status".into(),
            target,
            options: RequestOptions::default(),
        })
        .await?;

    if !reply.success {
        eprintln!("{}", reply.message);
        return Ok(EXIT_SERVER_FAILURE);
    }

    match reply.data {
        Some(data) if data.is_array() => output::print_status_table(&data),
        Some(data) => output::print_status_detail(&data),
        None => println!("{}", reply.message),
    }
    Ok(0)
}

async fn logs(target: String, lines: usize) -> Result<i32, ClientError> {
    let mut client = DaemonClient::connect().await?;
    let reply = client
        .request(&Request {
            action: "logs".into(),
            target: Some(target),
            options: RequestOptions {
                lines: Some(lines),
                ..Default::default()
            },
        })
        .await?;

    if !reply.success {
        eprintln!("{}", reply.message);
        return Ok(EXIT_SERVER_FAILURE);
    }

    if let Some(lines) = reply.data.as_ref().and_then(|d| d["lines"].as_array()) {
        if lines.is_empty() {
            eprintln!("no log entries");
        }
        for line in lines {
            if let Some(text) = line.as_str() {
                println!("{text}");
            }
        }
    }
    Ok(0)
}

/// Print the reply and map it to an exit code.
fn finish(reply: Reply) -> i32 {
    if reply.success {
        println!("{}", reply.message);
        0
    } else {
        eprintln!("{}", reply.message);
        EXIT_SERVER_FAILURE
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn validate_choice(
    value: &Option<String>,
    allowed: &[&str],
    flag: &str,
) -> Result<(), String> {
    match value {
        Some(v) if !allowed.contains(&v.as_str()) => {
            Err(format!("{flag} must be one of: {}", allowed.join(", ")))
        }
        _ => Ok(()),
    }
}

fn parse_log_format(token: &str) -> Option<LogFormat> {
    match token {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

fn parse_log_output(token: &str) -> Option<LogOutput> {
    match token {
        "file" => Some(LogOutput::File),
        "stdout" => Some(LogOutput::Stdout),
        _ => None,
    }
}
