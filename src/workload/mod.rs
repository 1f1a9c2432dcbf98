// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Workload parsing and dispatch.
//!
//! The dispatcher turns a parsed workload into one thread per operation.
//! Each operation is tagged with a per-transaction sequence number (0 for
//! the first operation of an id, strictly decreasing afterwards) so the
//! engine's sequencer can rebuild issuance order no matter how the threads
//! are scheduled. At end-of-workload every thread is joined before the
//! shared pools are torn down.

mod parser;

pub use parser::{parse, ParseError, Workload, WorkloadOp};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::error;

use crate::store::{CounterStore, ItemStore};
use crate::txn::{InMemoryLockTable, LockTable, Operation, TxnEngine, TxnId};

/// Spawns one operation thread per workload record and joins them at
/// end-of-workload.
pub struct Dispatcher<L = InMemoryLockTable, S = CounterStore> {
    engine: Arc<TxnEngine<L, S>>,
    seqs: HashMap<TxnId, i64>,
    handles: Vec<JoinHandle<()>>,
}

impl<L, S> Dispatcher<L, S>
where
    L: LockTable + 'static,
    S: ItemStore + 'static,
{
    /// Creates a dispatcher around an engine.
    pub fn new(engine: Arc<TxnEngine<L, S>>) -> Self {
        Self {
            engine,
            seqs: HashMap::new(),
            handles: Vec::new(),
        }
    }

    /// Dispatches one operation onto its own thread.
    ///
    /// The first operation seen for an id gets sequence number 0 even if it
    /// is not a `begin`; the engine then reports the unknown transaction
    /// instead of the operation parking forever on the sequencer.
    pub fn dispatch(&mut self, op: WorkloadOp) {
        let seq = match self.seqs.entry(op.tid) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                *entry.get()
            }
            Entry::Vacant(entry) => *entry.insert(0),
        };

        let engine = Arc::clone(&self.engine);
        let operation = Operation {
            tid: op.tid,
            seq,
            kind: op.kind,
        };
        self.handles
            .push(std::thread::spawn(move || engine.run(&operation)));
    }

    /// End-of-workload teardown: joins every operation thread, then releases
    /// the shared pools. The join must come first; no thread may still
    /// reference the pools when they are cleared.
    pub fn finish(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                error!("operation thread panicked");
            }
        }
        self.engine.debug_dump();
        self.engine.shutdown();
    }

    /// Dispatches an entire workload and runs teardown.
    pub fn run(engine: Arc<TxnEngine<L, S>>, workload: &Workload) {
        let mut dispatcher = Self::new(engine);
        for op in &workload.ops {
            dispatcher.dispatch(*op);
        }
        dispatcher.finish();
    }
}
