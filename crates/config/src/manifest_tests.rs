// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use warden_core::{LogFormat, LogOutput};

const FULL: &str = r#"
apps:
  - name: api
    script: server.js
    args: ["--port", "3000"]
    cwd: /srv/api
    env:
      PORT: "3000"
      NODE_ENV: production
    instances: 2
    watch: true
    watch_ignore: ["tmp/**"]
    memory_limit: 512mb
    cpu_limit: 80
    restart_delay: 2000
    max_restarts: 5
    health_check: http://127.0.0.1:3000/health
    log_format: json
    log_output: stdout
    metrics_port: 9100
  - name: worker
    script: worker.js
"#;

#[test]
fn full_manifest_folds_into_specs() {
    let specs = parse_manifest(FULL).unwrap();
    assert_eq!(specs.len(), 2);

    let api = &specs[0];
    assert_eq!(api.name, "api");
    assert_eq!(api.spec.args, vec!["--port", "3000"]);
    assert_eq!(api.spec.cwd.as_deref(), Some(std::path::Path::new("/srv/api")));
    assert_eq!(api.spec.env.get("PORT").map(String::as_str), Some("3000"));
    assert_eq!(api.spec.instances, 2);
    assert!(api.spec.watch);
    assert_eq!(api.spec.memory_limit_bytes, Some(512 * 1024 * 1024));
    assert_eq!(api.spec.cpu_limit_percent, Some(80.0));
    assert_eq!(api.spec.restart_delay_ms, 2_000);
    assert_eq!(api.spec.max_restarts, 5);
    assert_eq!(api.spec.log_format, LogFormat::Json);
    assert_eq!(api.spec.log_output, LogOutput::Stdout);
    assert_eq!(api.spec.metrics_port, Some(9100));

    let worker = &specs[1];
    assert_eq!(worker.spec.interpreter, "node");
    assert_eq!(worker.spec.restart_delay_ms, 1_000);
    assert_eq!(worker.spec.max_restarts, 10);
    assert_eq!(worker.spec.log_format, LogFormat::Text);
}

#[test]
fn auto_instances_degrade_to_one() {
    let specs = parse_manifest(
        "apps:\n  - name: a\n    script: a.js\n    instances: auto\n",
    )
    .unwrap();
    assert_eq!(specs[0].spec.instances, 1);
}

#[yare::parameterized(
    zero = { "instances: 0" },
    word = { "instances: many" },
)]
fn bad_instances_are_rejected(line: &str) {
    let text = format!("apps:\n  - name: a\n    script: a.js\n    {line}\n");
    assert!(matches!(
        parse_manifest(&text),
        Err(ConfigError::InvalidInstances { .. })
    ));
}

#[test]
fn empty_apps_list_is_rejected() {
    assert!(matches!(
        parse_manifest("apps: []\n"),
        Err(ConfigError::NoApps)
    ));
}

#[test]
fn duplicate_names_are_rejected() {
    let text = "apps:\n  - name: a\n    script: a.js\n  - name: a\n    script: b.js\n";
    assert!(matches!(
        parse_manifest(text),
        Err(ConfigError::DuplicateName(name)) if name == "a"
    ));
}

#[test]
fn missing_script_is_a_yaml_error() {
    assert!(matches!(
        parse_manifest("apps:\n  - name: a\n"),
        Err(ConfigError::Yaml(_))
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let text = "apps:\n  - name: a\n    script: a.js\n    retsart_delay: 5\n";
    assert!(matches!(parse_manifest(text), Err(ConfigError::Yaml(_))));
}

#[yare::parameterized(
    bad_unit = { "memory_limit: 10tb" },
    bare_number = { "memory_limit: \"100\"" },
)]
fn bad_memory_limits_are_rejected(line: &str) {
    let text = format!("apps:\n  - name: a\n    script: a.js\n    {line}\n");
    assert!(matches!(
        parse_manifest(&text),
        Err(ConfigError::Limit { .. })
    ));
}

#[test]
fn cpu_limit_out_of_range_is_rejected() {
    let text = "apps:\n  - name: a\n    script: a.js\n    cpu_limit: 150\n";
    assert!(matches!(
        parse_manifest(text),
        Err(ConfigError::Limit { .. })
    ));
}

#[yare::parameterized(
    zero = { 0 },
    too_big = { 70_000 },
)]
fn bad_metrics_ports_are_rejected(port: u64) {
    let text = format!("apps:\n  - name: a\n    script: a.js\n    metrics_port: {port}\n");
    assert!(matches!(
        parse_manifest(&text),
        Err(ConfigError::InvalidPort { .. })
    ));
}

#[yare::parameterized(
    scheme = { "ftp://example.com/health" },
    bare = { "localhost:3000" },
    empty_host = { "http://" },
)]
fn bad_health_urls_are_rejected(url: &str) {
    let text = format!("apps:\n  - name: a\n    script: a.js\n    health_check: \"{url}\"\n");
    assert!(matches!(
        parse_manifest(&text),
        Err(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn load_manifest_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apps.yaml");
    std::fs::write(&path, "apps:\n  - name: a\n    script: a.js\n").unwrap();

    let specs = load_manifest(&path).unwrap();
    assert_eq!(specs[0].name, "a");
}

#[test]
fn load_missing_manifest_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_manifest(&dir.path().join("nope.yaml")),
        Err(ConfigError::Io(..))
    ));
}
