// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Simulated data store.
//!
//! Each item is a single signed counter. A granted write increments it, a
//! granted read decrements it; the values exist only to make lock-protocol
//! violations observable (a lost update shows up as a wrong final count).

use parking_lot::Mutex;

use crate::txn::ItemId;

/// Read/increment/decrement access to the item array.
///
/// Callers must hold the appropriate lock on the item before mutating it;
/// the store itself only guarantees that individual calls are atomic.
pub trait ItemStore: Send + Sync {
    /// Returns the current value of an item, or `None` if out of range.
    fn value(&self, item: ItemId) -> Option<i64>;

    /// Increments an item and returns the post-increment value.
    fn increment(&self, item: ItemId) -> Option<i64>;

    /// Decrements an item and returns the post-decrement value.
    fn decrement(&self, item: ItemId) -> Option<i64>;

    /// Number of items in the store.
    fn len(&self) -> usize;

    /// Returns true if the store holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size in-memory counter array, all slots zero-initialized.
pub struct CounterStore {
    items: Mutex<Vec<i64>>,
}

impl CounterStore {
    /// Creates a store with `count` items, all set to zero.
    pub fn new(count: usize) -> Self {
        Self {
            items: Mutex::new(vec![0; count]),
        }
    }

    /// Snapshot of every item value, for teardown reporting and tests.
    pub fn snapshot(&self) -> Vec<i64> {
        self.items.lock().clone()
    }
}

impl ItemStore for CounterStore {
    fn value(&self, item: ItemId) -> Option<i64> {
        self.items.lock().get(item.0 as usize).copied()
    }

    fn increment(&self, item: ItemId) -> Option<i64> {
        let mut items = self.items.lock();
        let slot = items.get_mut(item.0 as usize)?;
        *slot += 1;
        Some(*slot)
    }

    fn decrement(&self, item: ItemId) -> Option<i64> {
        let mut items = self.items.lock();
        let slot = items.get_mut(item.0 as usize)?;
        *slot -= 1;
        Some(*slot)
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}
