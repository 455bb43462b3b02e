// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative in-memory map of supervised entries.
//!
//! The registry performs no locking of its own: it lives in a cell owned by
//! the supervisor, which is the single writer. The snapshot producer takes
//! the same cell read-only.

use std::collections::HashMap;
use warden_core::{Entry, EntryId, EntryState, IdGen};

#[derive(Default)]
pub struct Registry {
    entries: HashMap<EntryId, Entry>,
    names: HashMap<String, EntryId>,
}

impl Registry {
    /// Insert a new entry. The caller has already checked name uniqueness
    /// via [`Registry::name_in_use`].
    pub fn add(&mut self, entry: Entry) {
        self.names.insert(entry.name.clone(), entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Remove an entry, releasing its name.
    pub fn remove(&mut self, id: &EntryId) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        // Only drop the index slot if it still points at this entry; a
        // stopped entry may have already ceded its name to a newer one.
        if self.names.get(&entry.name) == Some(&entry.id) {
            self.names.remove(&entry.name);
        }
        Some(entry)
    }

    pub fn get(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Entry> {
        self.names.get(name).and_then(|id| self.entries.get(id))
    }

    /// Lookup by id first, then by name.
    pub fn resolve(&self, target: &str) -> Option<&Entry> {
        self.entries
            .get(target)
            .or_else(|| self.get_by_name(target))
    }

    /// True when `name` belongs to an entry that is not stopped.
    ///
    /// Names are unique across live entries only; a stopped entry retained
    /// for inspection does not block reuse of its name.
    pub fn name_in_use(&self, name: &str) -> bool {
        self.get_by_name(name)
            .is_some_and(|e| e.state != EntryState::Stopped)
    }

    /// All entries in name order.
    pub fn list(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Cloned entries for snapshotting.
    pub fn snapshot_entries(&self) -> Vec<Entry> {
        self.list().into_iter().cloned().collect()
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.list().iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw fresh ids until one is unused.
    pub fn generate_id(&self, id_gen: &dyn IdGen) -> EntryId {
        loop {
            let id = id_gen.next();
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
