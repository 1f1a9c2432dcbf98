// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-transaction operation sequencer.
//!
//! Every operation runs on its own thread, but a transaction's operations
//! must execute in issuance order. The dispatcher assigns each operation a
//! strictly decreasing sequence number (0 for the first operation of an id);
//! an operation thread blocks in [`OperationSequencer::enter`] until the
//! transaction's cursor reaches its number, and [`OperationSequencer::leave`]
//! advances the cursor when the operation finishes. This is a blocking
//! rendezvous equivalent to a single-consumer queue per transaction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::TxnId;

struct Slot {
    cursor: Mutex<i64>,
    resumed: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            cursor: Mutex::new(0),
            resumed: Condvar::new(),
        }
    }
}

/// Blocking rendezvous that forces a transaction's operation threads into
/// issuance order. Slots are created on demand, one per transaction id.
#[derive(Default)]
pub struct OperationSequencer {
    slots: Mutex<HashMap<TxnId, Arc<Slot>>>,
}

impl OperationSequencer {
    /// Creates a sequencer with no slots.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, tid: TxnId) -> Arc<Slot> {
        Arc::clone(
            self.slots
                .lock()
                .entry(tid)
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    /// Blocks the calling thread until the transaction's cursor equals `seq`.
    ///
    /// No operation may touch the registry or the lock table before this
    /// returns.
    pub fn enter(&self, tid: TxnId, seq: i64) {
        let slot = self.slot(tid);
        let mut cursor = slot.cursor.lock();
        while *cursor != seq {
            slot.resumed.wait(&mut cursor);
        }
    }

    /// Advances the cursor and wakes any thread blocked in `enter`.
    pub fn leave(&self, tid: TxnId) {
        let slot = self.slot(tid);
        let mut cursor = slot.cursor.lock();
        *cursor -= 1;
        slot.resumed.notify_all();
    }

    /// Current cursor value for a transaction, for diagnostics and tests.
    pub fn cursor(&self, tid: TxnId) -> i64 {
        *self.slot(tid).cursor.lock()
    }

    /// Drops the slot for a transaction id.
    pub fn remove(&self, tid: TxnId) {
        self.slots.lock().remove(&tid);
    }

    /// Drops every slot. Only safe once all operation threads are joined.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
