// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal rendering for status replies.

use serde_json::Value;

/// Render the status list as a fixed-width table.
pub fn print_status_table(data: &Value) {
    let Some(entries) = data.as_array() else {
        return;
    };
    if entries.is_empty() {
        println!("No processes");
        return;
    }

    let mut rows: Vec<[String; 8]> = Vec::with_capacity(entries.len() + 1);
    rows.push([
        "NAME".into(),
        "ID".into(),
        "STATE".into(),
        "PID".into(),
        "UPTIME".into(),
        "RESTARTS".into(),
        "CPU".into(),
        "MEM".into(),
    ]);

    for entry in entries {
        rows.push([
            text(entry, "name"),
            text(entry, "id"),
            text(entry, "state"),
            match entry["osPid"].as_u64() {
                Some(0) | None => "-".to_string(),
                Some(pid) => pid.to_string(),
            },
            format_duration_ms(entry["uptimeMs"].as_u64().unwrap_or(0)),
            entry["restartCount"].as_u64().unwrap_or(0).to_string(),
            format!("{:.1}%", entry["cpuPercent"].as_f64().unwrap_or(0.0)),
            format_bytes(entry["rssBytes"].as_u64().unwrap_or(0)),
        ]);
    }

    let mut widths = [0usize; 8];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{cell:<width$}", width = *width))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Render a single entry with its crash history.
pub fn print_status_detail(data: &Value) {
    println!("name:            {}", text(data, "name"));
    println!("id:              {}", text(data, "id"));
    println!("state:           {}", text(data, "state"));
    println!("pid:             {}", data["osPid"].as_u64().unwrap_or(0));
    println!(
        "uptime:          {}",
        format_duration_ms(data["uptimeMs"].as_u64().unwrap_or(0))
    );
    println!(
        "restarts:        {}",
        data["restartCount"].as_u64().unwrap_or(0)
    );
    if let Some(reason) = data["lastRestartReason"].as_str() {
        println!("last restart:    {reason}");
    }
    println!(
        "cpu:             {:.1}%",
        data["cpuPercent"].as_f64().unwrap_or(0.0)
    );
    println!(
        "memory:          {}",
        format_bytes(data["rssBytes"].as_u64().unwrap_or(0))
    );
    println!("script:          {}", text(&data["spec"], "script"));

    let crashes = &data["crashes"];
    let total = crashes["total"].as_u64().unwrap_or(0);
    println!("crashes:         {total}");
    if total > 0 {
        println!(
            "  last minute:   {}",
            crashes["lastMinute"].as_u64().unwrap_or(0)
        );
        if let Some(code) = crashes["modalExitCode"].as_i64() {
            println!("  modal exit:    {code}");
        }
        println!(
            "  mean uptime:   {}",
            format_duration_ms(crashes["meanUptimeMs"].as_u64().unwrap_or(0))
        );
        if let Some(recent) = crashes["recent"].as_array() {
            for crash in recent {
                let when = crash["timestamp"].as_u64().unwrap_or(0);
                let code = crash["exitCode"]
                    .as_i64()
                    .map(|c| format!("exit {c}"))
                    .or_else(|| crash["signal"].as_i64().map(|s| format!("signal {s}")))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  - {} ({code})", format_epoch_ms(when));
            }
        }
    }
}

fn text(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or("-").to_string()
}

/// `9s`, `5m 3s`, `2h 11m`, `3d 4h`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3_600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3_600)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1}gb", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}mb", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}kb", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}b")
    }
}

/// Seconds-precision clock time for crash tails.
fn format_epoch_ms(epoch_ms: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let ago = now.saturating_sub(epoch_ms);
    format!("{} ago", format_duration_ms(ago))
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
