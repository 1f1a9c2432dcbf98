// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory lock table.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::lock::{GroupId, ItemId, LockHolder, LockTable};
use super::TxnId;

/// Keyed multimap from `(group, item)` to the current holder records.
///
/// Holder order is insertion order, so `holders()[0]` is the earliest holder
/// still present; the engine treats it as the representative holder when a
/// requester has to queue.
pub struct InMemoryLockTable {
    entries: RwLock<HashMap<(GroupId, ItemId), Vec<LockHolder>>>,
}

impl InMemoryLockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of holder records, for teardown checks and tests.
    pub fn holder_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }
}

impl Default for InMemoryLockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable for InMemoryLockTable {
    fn holders(&self, group: GroupId, item: ItemId) -> Vec<LockHolder> {
        self.entries
            .read()
            .get(&(group, item))
            .cloned()
            .unwrap_or_default()
    }

    fn add(&self, holder: LockHolder) {
        self.entries
            .write()
            .entry((holder.group, holder.item))
            .or_default()
            .push(holder);
    }

    fn remove(&self, tid: TxnId, group: GroupId, item: ItemId) -> Option<LockHolder> {
        let mut entries = self.entries.write();
        let holders = entries.get_mut(&(group, item))?;
        let pos = holders.iter().position(|h| h.tid == tid)?;
        let removed = holders.remove(pos);
        if holders.is_empty() {
            entries.remove(&(group, item));
        }
        Some(removed)
    }

    fn holds(&self, tid: TxnId, group: GroupId, item: ItemId) -> bool {
        self.entries
            .read()
            .get(&(group, item))
            .is_some_and(|holders| holders.iter().any(|h| h.tid == tid))
    }
}
