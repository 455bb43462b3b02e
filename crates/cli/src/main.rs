// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden - thin command-line client for the warden daemon

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};

/// Exit code for a failure reported by the daemon.
const EXIT_SERVER_FAILURE: i32 = 1;

/// Exit code for a transport failure (daemon unreachable, timeout).
const EXIT_TRANSPORT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "warden - keep local processes alive"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a script (or every app in a manifest) under supervision
    Start(commands::StartArgs),
    /// Stop a process by id or name, or `all`
    Stop {
        /// Process id, name, or `all`
        target: String,
    },
    /// Restart a process by id or name, or `all`
    Restart {
        /// Process id, name, or `all`
        target: String,
    },
    /// Show all processes, or detail for one
    Status {
        /// Process id or name
        target: Option<String>,
    },
    /// Tail a process's captured output
    Logs {
        /// Process id or name
        target: String,
        /// Lines to show
        #[arg(long, short = 'n', default_value_t = 20)]
        lines: usize,
    },
    /// Persist the registry snapshot now
    Save,
    /// Stop a process and remove its history, or `all`
    Delete {
        /// Process id, name, or `all`
        target: String,
    },
    /// Install the login-time boot unit for the daemon
    Startup,
    /// Remove the login-time boot unit
    Unstartup,
    /// Check that the daemon answers
    Ping,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match commands::run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_TRANSPORT_FAILURE
        }
    };
    std::process::exit(code);
}
