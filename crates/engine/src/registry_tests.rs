// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use warden_core::{ProcessSpec, SequentialIdGen};

fn entry(id: &str, name: &str, state: EntryState) -> Entry {
    let mut e = Entry::new(EntryId::new(id), name, ProcessSpec::for_script("a.js"));
    e.state = state;
    e
}

#[test]
fn add_and_resolve_by_id_and_name() {
    let mut reg = Registry::default();
    reg.add(entry("aaaaaaaaaa", "api", EntryState::Running));

    assert_eq!(reg.resolve("aaaaaaaaaa").map(|e| e.name.as_str()), Some("api"));
    assert_eq!(
        reg.resolve("api").map(|e| e.id.as_str()),
        Some("aaaaaaaaaa")
    );
    assert!(reg.resolve("ghost").is_none());
}

#[test]
fn id_lookup_wins_over_name() {
    let mut reg = Registry::default();
    // Pathological: one entry's name equals another entry's id.
    reg.add(entry("aaaaaaaaaa", "bbbbbbbbbb", EntryState::Running));
    reg.add(entry("bbbbbbbbbb", "other", EntryState::Running));

    assert_eq!(
        reg.resolve("bbbbbbbbbb").map(|e| e.name.as_str()),
        Some("other")
    );
}

#[test]
fn remove_releases_the_name() {
    let mut reg = Registry::default();
    reg.add(entry("aaaaaaaaaa", "api", EntryState::Running));
    assert!(reg.name_in_use("api"));

    let removed = reg.remove(&EntryId::new("aaaaaaaaaa")).unwrap();
    assert_eq!(removed.name, "api");
    assert!(!reg.name_in_use("api"));
    assert!(reg.is_empty());
}

#[test]
fn stopped_entries_do_not_hold_their_name() {
    let mut reg = Registry::default();
    reg.add(entry("aaaaaaaaaa", "api", EntryState::Stopped));
    assert!(!reg.name_in_use("api"));

    // A new live entry may take the name; the stopped one remains by id.
    reg.add(entry("bbbbbbbbbb", "api", EntryState::Running));
    assert!(reg.name_in_use("api"));
    assert_eq!(
        reg.get_by_name("api").map(|e| e.id.as_str()),
        Some("bbbbbbbbbb")
    );
    assert!(reg.get(&EntryId::new("aaaaaaaaaa")).is_some());

    // Removing the old stopped entry must not free the newer holder's name.
    reg.remove(&EntryId::new("aaaaaaaaaa"));
    assert!(reg.name_in_use("api"));
}

#[test]
fn errored_entries_hold_their_name() {
    let mut reg = Registry::default();
    reg.add(entry("aaaaaaaaaa", "api", EntryState::Errored));
    assert!(reg.name_in_use("api"));
}

#[test]
fn list_is_name_ordered() {
    let mut reg = Registry::default();
    reg.add(entry("aaaaaaaaaa", "zeta", EntryState::Running));
    reg.add(entry("bbbbbbbbbb", "alpha", EntryState::Running));

    let names: Vec<&str> = reg.list().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn generate_id_skips_taken_ids() {
    let mut reg = Registry::default();
    let id_gen = SequentialIdGen::new("t");
    // Occupy the first id the generator will produce.
    reg.add(entry("t-000001", "api", EntryState::Running));

    let id = reg.generate_id(&id_gen);
    assert_eq!(id.as_str(), "t-000002");
}
