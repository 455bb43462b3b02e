// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden daemon (wardend)
//!
//! Long-lived background process that supervises child programs and serves
//! the control socket. Started implicitly by the `warden` CLI; not meant
//! to be run by hand except for debugging.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};
use warden_core::{AlphanumericIdGen, SystemClock, Tunables};
use warden_daemon::lifecycle::{self, Config, LifecycleError};
use warden_daemon::listener::{ControlPlane, ListenCtx};
use warden_engine::{Command, Supervisor, SupervisorDeps};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("wardend {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("wardend {}", env!("CARGO_PKG_VERSION"));
                println!("warden daemon - supervises child processes and serves the control socket");
                println!();
                println!("USAGE:");
                println!("    wardend");
                println!();
                println!("The daemon is normally started by the `warden` CLI and should not");
                println!("be invoked directly. It listens on a local socket for commands.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: wardend [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    config.ensure_dirs()?;

    rotate_log_if_needed(&config.log_path);
    let log_guard = setup_logging(&config)?;

    info!("starting wardend {}", env!("CARGO_PKG_VERSION"));

    match lifecycle::acquire_pid_file(&config) {
        Ok(()) => {}
        Err(LifecycleError::AlreadyRunning { pid }) => {
            eprintln!("wardend is already running (pid {pid})");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to claim pid file");
            drop(log_guard);
            return Err(e.into());
        }
    }

    let socket = match lifecycle::bind_socket(&config) {
        Ok(socket) => socket,
        Err(e) => {
            error!(error = %e, "failed to bind control socket");
            lifecycle::release(&config);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let tunables = Tunables::from_env();
    let shutdown_watchdog = tunables.shutdown_watchdog;

    let deps = SupervisorDeps {
        data_dir: config.data_dir.clone(),
        logs_dir: config.logs_dir.clone(),
        crashes_dir: config.crashes_dir.clone(),
        snapshot_path: config.snapshot_path.clone(),
        tunables,
        clock: Arc::new(SystemClock),
        id_gen: Arc::new(AlphanumericIdGen),
    };
    let (mut supervisor, handle, queue) = Supervisor::new(deps);

    // Restore before accepting commands so clients never observe a
    // half-recovered registry.
    match lifecycle::load_entries(&config) {
        Ok(entries) if !entries.is_empty() => {
            info!(count = entries.len(), "restoring entries from snapshot");
            supervisor.restore(entries);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "snapshot unreadable, starting empty"),
    }
    tokio::spawn(supervisor.run(queue));

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        supervisor: handle.clone(),
        shutdown: Arc::clone(&shutdown),
    });
    tokio::spawn(ControlPlane::new(socket, ctx).run());

    info!("daemon ready, listening on {}", config.socket_path.display());

    // Signal ready for whoever spawned us (CLI waiting for startup).
    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = shutdown.notified() => info!("shutdown requested via command"),
    }

    // If graceful stop stalls, the watchdog force-exits the process.
    tokio::spawn(async move {
        tokio::time::sleep(shutdown_watchdog).await;
        eprintln!("shutdown watchdog fired, force exiting");
        std::process::exit(1);
    });

    if let Err(e) = handle.command(Command::Shutdown).await {
        warn!(error = %e, "supervisor shutdown failed");
    }

    lifecycle::release(&config);
    info!("daemon stopped");
    drop(log_guard);
    Ok(())
}

/// Maximum daemon log size before startup rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated daemon logs kept (`daemon.log.1` .. `.3`).
const MAX_ROTATED_LOGS: u32 = 3;

/// Shift `daemon.log` → `.1` → `.2` → `.3` when the live file is large.
/// Best-effort: a rotation failure must not stop the daemon.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let base = log_path.display().to_string();
    for n in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(format!("{base}.{n}"), format!("{base}.{}", n + 1));
    }
    let _ = std::fs::rename(log_path, format!("{base}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let directory = config
        .log_path
        .parent()
        .ok_or(LifecycleError::NoHomeDir)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoHomeDir)?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
