// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_contract() {
    let t = Tunables::default();
    assert_eq!(t.sample_interval, Duration::from_secs(5));
    assert_eq!(t.stop_timeout, Duration::from_secs(10));
    assert_eq!(t.watch_debounce, Duration::from_millis(500));
    assert_eq!(t.snapshot_quiesce, Duration::from_secs(1));
    assert_eq!(t.ready_timeout, Duration::from_secs(10));
    assert_eq!(t.shutdown_watchdog, Duration::from_secs(10));
}
