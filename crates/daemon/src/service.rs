// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host init-system integration: boot persistence for the daemon.
//!
//! `startup` writes a user-level unit that relaunches `wardend` at login
//! with unconditional restart; `unstartup` unloads and removes it.
//! Activation through `launchctl`/`systemctl` is best-effort — a missing
//! tool is logged, not fatal, because the unit file alone is still useful.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::warn;

const PRODUCT: &str = "warden";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("could not locate the daemon binary: {0}")]
    NoExecutable(#[source] std::io::Error),

    #[error("init-system integration is not supported on this platform")]
    Unsupported,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the boot unit and try to activate it.
pub fn install() -> Result<String, ServiceError> {
    let home = dirs::home_dir().ok_or(ServiceError::NoHomeDir)?;
    let exe = std::env::current_exe().map_err(ServiceError::NoExecutable)?;
    let path = unit_path_in(&home)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, render_unit(&exe))?;
    activate(&path);

    Ok(format!("Startup configured: {}", path.display()))
}

/// Deactivate and remove the boot unit.
pub fn uninstall() -> Result<String, ServiceError> {
    let home = dirs::home_dir().ok_or(ServiceError::NoHomeDir)?;
    let path = unit_path_in(&home)?;

    deactivate(&path);
    match std::fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    Ok(format!("Startup removed: {}", path.display()))
}

/// Where the unit lives for this user.
pub fn unit_path_in(home: &Path) -> Result<PathBuf, ServiceError> {
    if cfg!(target_os = "macos") {
        Ok(home
            .join("Library/LaunchAgents")
            .join(format!("{PRODUCT}.plist")))
    } else if cfg!(target_os = "linux") {
        Ok(home
            .join(".config/systemd/user")
            .join(format!("{PRODUCT}.service")))
    } else {
        Err(ServiceError::Unsupported)
    }
}

/// The unit file contents for this platform.
pub fn render_unit(exe: &Path) -> String {
    if cfg!(target_os = "macos") {
        render_launch_agent(exe)
    } else {
        render_systemd_unit(exe)
    }
}

fn render_launch_agent(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{PRODUCT}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
</dict>
</plist>
"#,
        exe = exe.display()
    )
}

fn render_systemd_unit(exe: &Path) -> String {
    format!(
        "[Unit]\n\
         Description={PRODUCT} process supervisor\n\
         \n\
         [Service]\n\
         ExecStart={exe}\n\
         Restart=always\n\
         RestartSec=2\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        exe = exe.display()
    )
}

fn activate(path: &Path) {
    if cfg!(target_os = "macos") {
        run_tool("launchctl", &["load", "-w", &path.display().to_string()]);
    } else {
        run_tool("systemctl", &["--user", "daemon-reload"]);
        run_tool(
            "systemctl",
            &["--user", "enable", &format!("{PRODUCT}.service")],
        );
    }
}

fn deactivate(path: &Path) {
    if cfg!(target_os = "macos") {
        run_tool("launchctl", &["unload", "-w", &path.display().to_string()]);
    } else {
        run_tool(
            "systemctl",
            &["--user", "disable", &format!("{PRODUCT}.service")],
        );
    }
}

/// Run an init-system tool, swallowing its absence or failure.
fn run_tool(tool: &str, args: &[&str]) {
    match Command::new(tool).args(args).output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => warn!(
            tool,
            ?args,
            status = %output.status,
            "init-system tool reported failure"
        ),
        Err(e) => warn!(tool, error = %e, "init-system tool unavailable"),
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
