// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock manager and transaction state machine.
//!
//! [`TxnEngine`] is the core protocol: it decides, for each
//! `(transaction, item, mode)` request, whether to grant immediately, grant
//! after waiting, or grant via re-entrant ownership; it drives transitions
//! between transaction states; and on commit/abort it releases every lock
//! held by the transaction and wakes the transactions queued behind it.
//!
//! Synchronization is two-level. A single coarse mutex (the registry lock)
//! protects all registry and lock-table edits and is never held across a
//! blocking wait. Cross-transaction waiting goes through the
//! [`WaitRegistry`], keyed by the holder's id, outside the coarse region so
//! the holder can still make progress and eventually release.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::store::{CounterStore, ItemStore};

use super::error::TxnError;
use super::lock::{GroupId, ItemId, LockHolder, LockMode, LockTable};
use super::registry::TransactionRegistry;
use super::sequencer::OperationSequencer;
use super::table::InMemoryLockTable;
use super::transaction::{TxnId, TxnKind, TxnState};
use super::waitlist::WaitRegistry;

/// Lock group under which every data item is keyed.
const DATA_GROUP: GroupId = 1;

/// The kind of a workload operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Begin a transaction of the given kind.
    Begin(TxnKind),
    /// Read an item under a shared lock.
    Read(ItemId),
    /// Write an item under an exclusive lock.
    Write(ItemId),
    /// Commit the transaction.
    Commit,
    /// Abort the transaction.
    Abort,
}

/// One dispatched operation, as handed to an operation thread.
///
/// `seq` is the sequencer rendezvous number: 0 for the first operation of a
/// transaction id, each later operation one lower.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub tid: TxnId,
    pub seq: i64,
    pub kind: OpKind,
}

/// Transaction concurrency-control engine.
///
/// Generic over the lock table and item store so the collaborators can be
/// swapped in tests; defaults are the in-memory implementations.
pub struct TxnEngine<L = InMemoryLockTable, S = CounterStore> {
    registry: Mutex<TransactionRegistry>,
    lock_table: Arc<L>,
    store: Arc<S>,
    waits: WaitRegistry,
    sequencer: OperationSequencer,
    audit: AuditLog,
    /// Per-transaction simulated op times, write-once at startup.
    op_times: Vec<u64>,
    write_weight: u64,
    read_weight: u64,
}

impl TxnEngine {
    /// Creates an engine with the default in-memory lock table and counter
    /// store sized from the configuration.
    pub fn new(config: &EngineConfig, audit: AuditLog) -> Self {
        Self::with_parts(
            config,
            audit,
            Arc::new(InMemoryLockTable::new()),
            Arc::new(CounterStore::new(config.item_count)),
        )
    }
}

impl<L: LockTable, S: ItemStore> TxnEngine<L, S> {
    /// Creates an engine around explicit collaborators.
    pub fn with_parts(
        config: &EngineConfig,
        audit: AuditLog,
        lock_table: Arc<L>,
        store: Arc<S>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(config.op_time_seed);
        let range = config.op_time_range.max(1);
        let op_times = (0..=config.max_transactions)
            .map(|_| rng.gen_range(0..range))
            .collect();

        Self {
            registry: Mutex::new(TransactionRegistry::new()),
            lock_table,
            store,
            waits: WaitRegistry::new(),
            sequencer: OperationSequencer::new(),
            audit,
            op_times,
            write_weight: config.write_weight,
            read_weight: config.read_weight,
        }
    }

    /// The operation sequencer gating entry into this engine.
    pub fn sequencer(&self) -> &OperationSequencer {
        &self.sequencer
    }

    /// The item store backing simulated reads and writes.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The lock table.
    pub fn lock_table(&self) -> &L {
        &self.lock_table
    }

    /// Runs one dispatched operation end to end: rendezvous on the
    /// sequencer, execute, record any error, release the gate.
    ///
    /// Per-operation errors stay on this thread; they are logged and the
    /// thread exits without effect.
    pub fn run(&self, op: &Operation) {
        self.sequencer.enter(op.tid, op.seq);
        let result = match op.kind {
            OpKind::Begin(kind) => self.begin(op.tid, kind),
            OpKind::Read(item) => self.read(op.tid, item),
            OpKind::Write(item) => self.write(op.tid, item),
            OpKind::Commit => self.commit(op.tid),
            OpKind::Abort => self.abort(op.tid),
        };
        if let Err(err) = result {
            warn!(tid = %op.tid, error = %err, "operation failed");
            self.log(self.audit.protocol_error(op.tid, &err.to_string()));
        }
        self.sequencer.leave(op.tid);
    }

    /// Begins a transaction: registers it as ACTIVE and records `BeginTx`.
    pub fn begin(&self, tid: TxnId, kind: TxnKind) -> Result<(), TxnError> {
        self.registry.lock().register(tid, kind)?;
        self.log(self.audit.begin(tid, kind));
        Ok(())
    }

    /// Reads an item under a shared lock, decrementing its value.
    pub fn read(&self, tid: TxnId, item: ItemId) -> Result<(), TxnError> {
        self.access(tid, item, LockMode::Shared)
    }

    /// Writes an item under an exclusive lock, incrementing its value.
    pub fn write(&self, tid: TxnId, item: ItemId) -> Result<(), TxnError> {
        self.access(tid, item, LockMode::Exclusive)
    }

    /// Commits a transaction: releases its locks and wakes its waiters.
    pub fn commit(&self, tid: TxnId) -> Result<(), TxnError> {
        self.finish(tid, TxnState::Committed)
    }

    /// Aborts a transaction: releases its locks and wakes its waiters.
    pub fn abort(&self, tid: TxnId) -> Result<(), TxnError> {
        self.finish(tid, TxnState::Aborted)
    }

    fn access(&self, tid: TxnId, item: ItemId, mode: LockMode) -> Result<(), TxnError> {
        if self.store.value(item).is_none() {
            return Err(TxnError::ItemOutOfRange(item));
        }
        let state = self
            .registry
            .lock()
            .lookup(tid)
            .ok_or(TxnError::UnknownTransaction(tid))?
            .state();
        match state {
            TxnState::Active => {
                self.acquire(tid, item, mode)?;
                self.effect(tid, item, mode)
            }
            observed => {
                // An operation against a non-active transaction is an
                // implicit termination signal for that state.
                warn!(tid = %tid, state = ?observed, "operation on non-active transaction, terminating");
                self.finish(tid, observed)
            }
        }
    }

    /// The acquire protocol: grant immediately, grant re-entrantly, or queue
    /// behind the representative holder and retry once released.
    fn acquire(&self, tid: TxnId, item: ItemId, mode: LockMode) -> Result<(), TxnError> {
        loop {
            let guard = {
                let mut registry = self.registry.lock();
                if registry.lookup(tid).is_none() {
                    // The transaction was terminated while we were queued.
                    return Err(TxnError::UnknownTransaction(tid));
                }
                let holders = self.lock_table.holders(DATA_GROUP, item);
                match holders.first().copied() {
                    None => {
                        self.grant(&mut registry, tid, item, mode);
                        return Ok(());
                    }
                    Some(_) if holders.iter().any(|h| h.tid == tid) => {
                        // Re-entrant: already a holder, whatever the mode.
                        return Ok(());
                    }
                    Some(front) => {
                        // Shared joins shared only when nobody is queued on
                        // the holder; queue-jumping would starve writers.
                        let shared_compatible = mode == LockMode::Shared
                            && front.mode == LockMode::Shared
                            && self.waits.waiter_count(front.tid) == 0;
                        if shared_compatible {
                            self.grant(&mut registry, tid, item, mode);
                            return Ok(());
                        }
                        if let Some(txn) = registry.lookup_mut(tid) {
                            txn.mark_waiting(item, mode, front.tid);
                        }
                        // Register as waiter before the coarse region drops
                        // so the holder's release cannot slip past unseen.
                        self.waits.prepare(front.tid)
                    }
                }
            };
            guard.wait();
            // Holder released: clear the waiting markers and retry against
            // the now-current holder state.
            if let Some(txn) = self.registry.lock().lookup_mut(tid) {
                txn.mark_resumed();
            }
        }
    }

    fn grant(&self, registry: &mut TransactionRegistry, tid: TxnId, item: ItemId, mode: LockMode) {
        self.lock_table.add(LockHolder {
            tid,
            group: DATA_GROUP,
            item,
            mode,
        });
        if let Some(txn) = registry.lookup_mut(tid) {
            txn.held.push(item);
        }
    }

    /// The simulated read/write effect once a lock is granted: exclusive
    /// increments, shared decrements, then a bounded delay proportional to
    /// the transaction's op time models operation latency.
    fn effect(&self, tid: TxnId, item: ItemId, mode: LockMode) -> Result<(), TxnError> {
        let value = match mode {
            LockMode::Exclusive => self.store.increment(item),
            LockMode::Shared => self.store.decrement(item),
        }
        .ok_or(TxnError::ItemOutOfRange(item))?;

        let op_time = self.op_time(tid);
        let state = self
            .registry
            .lock()
            .lookup(tid)
            .map(|t| t.state())
            .unwrap_or(TxnState::Active);
        self.log(self.audit.granted(tid, mode, item, value, op_time, state));

        let weight = match mode {
            LockMode::Exclusive => self.write_weight,
            LockMode::Shared => self.read_weight,
        };
        std::thread::sleep(Duration::from_micros(op_time * weight));
        Ok(())
    }

    /// The termination path shared by commit, abort, and forced termination
    /// of a non-active transaction.
    fn finish(&self, tid: TxnId, outcome: TxnState) -> Result<(), TxnError> {
        // The outcome is logged against the id even when the id turns out to
        // be stale; the stale case then surfaces as a protocol violation.
        self.log(self.audit.outcome(tid, outcome));

        let released = {
            let mut registry = self.registry.lock();
            let txn = registry.unregister(tid)?;

            let mut released = Vec::with_capacity(txn.held_items().len());
            for &item in txn.held_items() {
                if self.lock_table.remove(tid, DATA_GROUP, item).is_some() {
                    released.push((item, self.store.value(item).unwrap_or(0)));
                } else {
                    error!(tid = %tid, item = %item, "held lock missing from table at release");
                }
            }

            // Wake every transaction queued behind this one, one permit
            // each, while still inside the coarse region so late arrivals
            // cannot be miscounted.
            let waiters = self.waits.waiter_count(tid);
            for _ in 0..waiters {
                self.waits.signal(tid);
            }
            released
        };
        self.log(self.audit.released(tid, &released));
        Ok(())
    }

    /// Extension point: cycle detection over the waits-for graph.
    ///
    /// The base protocol provides no liveness guarantee against circular
    /// waits; this hook exists for an external detector and returns no
    /// cycles here.
    pub fn detect_cycles(&self) -> Vec<Vec<TxnId>> {
        Vec::new()
    }

    /// Extension point: victim selection for a detected cycle. Inert in the
    /// base engine.
    pub fn choose_victim(&self, _cycle: &[TxnId]) -> Option<TxnId> {
        None
    }

    /// Current state of a transaction, if it is live.
    pub fn state_of(&self, tid: TxnId) -> Option<TxnState> {
        self.registry.lock().lookup(tid).map(|t| t.state())
    }

    /// The transaction `tid` is currently blocked behind, if any.
    pub fn blocked_behind(&self, tid: TxnId) -> Option<TxnId> {
        self.registry.lock().lookup(tid).and_then(|t| t.waiting_on())
    }

    /// Ids of all live transactions, sorted.
    pub fn live_transactions(&self) -> Vec<TxnId> {
        let mut tids: Vec<_> = self.registry.lock().iter().map(|t| t.tid()).collect();
        tids.sort();
        tids
    }

    /// Dumps the live transaction list at debug level.
    pub fn debug_dump(&self) {
        let registry = self.registry.lock();
        for txn in registry.iter() {
            debug!(
                tid = %txn.tid(),
                kind = ?txn.kind(),
                state = ?txn.state(),
                waiting_on = ?txn.waiting_on(),
                held = ?txn.held_items(),
                "live transaction"
            );
        }
    }

    /// Releases the shared pools and flushes the audit log.
    ///
    /// Callers must have joined every operation thread first; teardown must
    /// not run while any thread might still reference the pools.
    pub fn shutdown(&self) {
        self.sequencer.clear();
        self.waits.clear();
        self.log(self.audit.flush());
    }

    fn op_time(&self, tid: TxnId) -> u64 {
        self.op_times[tid.0 as usize % self.op_times.len()]
    }

    fn log(&self, result: std::io::Result<()>) {
        if let Err(err) = result {
            error!(error = %err, "audit log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    const ITEM0: ItemId = ItemId(0);
    const ITEM1: ItemId = ItemId(1);

    fn test_config() -> EngineConfig {
        // op_time_range 1 generates all-zero op times: no simulated latency.
        EngineConfig::default()
            .with_item_count(4)
            .with_op_time_range(1)
    }

    fn test_engine() -> TxnEngine {
        TxnEngine::new(&test_config(), AuditLog::sink())
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_single_writer_commits() {
        // Scenario: begin T1 (write), write item0, commit T1.
        let capture = Capture::default();
        let audit = AuditLog::from_writer(capture.clone()).unwrap();
        let engine = TxnEngine::new(&test_config(), audit);

        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.commit(TxnId(1)).unwrap();

        assert_eq!(engine.store().value(ITEM0), Some(1));
        assert_eq!(engine.lock_table().holder_count(), 0);
        assert!(engine.live_transactions().is_empty());

        // Audit records appear in issuance order.
        let text = capture.contents();
        let begin = text.find("T1\tW\tBeginTx").unwrap();
        let write = text.find("T1\t\twriteTx\t0:1:").unwrap();
        let commit = text.find("T1\t\tCommitTx").unwrap();
        assert!(begin < write && write < commit);
    }

    #[test]
    fn test_reader_waits_for_writer() {
        // Scenario: T1 holds exclusive on item0; T2's read must wait until
        // T1 commits, then decrement from T1's post-write value.
        let engine = Arc::new(test_engine());
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadOnly).unwrap();

        let e2 = Arc::clone(&engine);
        let reader = thread::spawn(move || e2.read(TxnId(2), ITEM0));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.state_of(TxnId(2)), Some(TxnState::Waiting));
        assert_eq!(engine.blocked_behind(TxnId(2)), Some(TxnId(1)));
        assert_eq!(engine.store().value(ITEM0), Some(1));

        engine.commit(TxnId(1)).unwrap();
        reader.join().unwrap().unwrap();

        assert_eq!(engine.store().value(ITEM0), Some(0));
        assert_eq!(engine.state_of(TxnId(2)), Some(TxnState::Active));
        engine.commit(TxnId(2)).unwrap();
    }

    #[test]
    fn test_shared_readers_proceed_together() {
        // Scenario: two shared requests on an unheld item both proceed.
        let engine = test_engine();
        engine.begin(TxnId(1), TxnKind::ReadOnly).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadOnly).unwrap();

        engine.read(TxnId(1), ITEM0).unwrap();
        engine.read(TxnId(2), ITEM0).unwrap();

        assert_eq!(engine.store().value(ITEM0), Some(-2));
        let holders = engine.lock_table().holders(1, ITEM0);
        assert_eq!(holders.len(), 2);
        assert!(holders.iter().all(|h| h.mode == LockMode::Shared));

        engine.commit(TxnId(1)).unwrap();
        engine.commit(TxnId(2)).unwrap();
        assert_eq!(engine.lock_table().holder_count(), 0);
    }

    #[test]
    fn test_unknown_transaction_has_no_effect() {
        // Scenario: an operation on an id never begun.
        let engine = test_engine();
        let err = engine.read(TxnId(9), ITEM0).unwrap_err();
        assert!(matches!(err, TxnError::UnknownTransaction(TxnId(9))));
        assert_eq!(engine.store().value(ITEM0), Some(0));
    }

    #[test]
    fn test_double_commit_is_protocol_violation() {
        // Scenario: committing the same id twice.
        let engine = test_engine();
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.commit(TxnId(1)).unwrap();

        let err = engine.commit(TxnId(1)).unwrap_err();
        assert!(matches!(err, TxnError::DuplicateTermination(TxnId(1))));
        assert_eq!(engine.store().value(ITEM0), Some(1));
    }

    #[test]
    fn test_reentrant_access_adds_no_second_record() {
        let engine = test_engine();
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();

        assert_eq!(engine.lock_table().holder_count(), 1);
        assert_eq!(engine.store().value(ITEM0), Some(2));
        engine.commit(TxnId(1)).unwrap();
    }

    #[test]
    fn test_exclusive_holder_is_alone() {
        let engine = Arc::new(test_engine());
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadWrite).unwrap();

        let e2 = Arc::clone(&engine);
        let writer = thread::spawn(move || e2.write(TxnId(2), ITEM0));
        thread::sleep(Duration::from_millis(50));

        let holders = engine.lock_table().holders(1, ITEM0);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].mode, LockMode::Exclusive);

        engine.commit(TxnId(1)).unwrap();
        writer.join().unwrap().unwrap();
        engine.commit(TxnId(2)).unwrap();
        assert_eq!(engine.store().value(ITEM0), Some(2));
    }

    #[test]
    fn test_shared_request_cannot_jump_queue() {
        // T1 holds shared; T2 queues for exclusive; T3's shared request must
        // queue behind T2 even though shared/shared is compatible.
        let engine = Arc::new(test_engine());
        engine.begin(TxnId(1), TxnKind::ReadOnly).unwrap();
        engine.read(TxnId(1), ITEM0).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadWrite).unwrap();
        engine.begin(TxnId(3), TxnKind::ReadOnly).unwrap();

        let e2 = Arc::clone(&engine);
        let writer = thread::spawn(move || e2.write(TxnId(2), ITEM0));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.state_of(TxnId(2)), Some(TxnState::Waiting));

        let e3 = Arc::clone(&engine);
        let reader = thread::spawn(move || e3.read(TxnId(3), ITEM0));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.state_of(TxnId(3)), Some(TxnState::Waiting));
        assert_eq!(engine.store().value(ITEM0), Some(-1));

        engine.commit(TxnId(1)).unwrap();

        // The released waiters re-acquire in arbitrary order; whoever gets
        // the lock first blocks the other until it commits.
        let winner = loop {
            let holders = engine.lock_table().holders(1, ITEM0);
            if let Some(front) = holders.first() {
                break front.tid;
            }
            thread::sleep(Duration::from_millis(5));
        };
        thread::sleep(Duration::from_millis(50));
        engine.commit(winner).unwrap();

        writer.join().unwrap().unwrap();
        reader.join().unwrap().unwrap();

        let loser = if winner == TxnId(2) { TxnId(3) } else { TxnId(2) };
        engine.commit(loser).unwrap();

        // One increment and two decrements in total.
        assert_eq!(engine.store().value(ITEM0), Some(-1));
        assert_eq!(engine.lock_table().holder_count(), 0);
    }

    #[test]
    fn test_operation_on_waiting_transaction_terminates_it() {
        let engine = Arc::new(test_engine());
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadOnly).unwrap();

        let e2 = Arc::clone(&engine);
        let reader = thread::spawn(move || e2.read(TxnId(2), ITEM0));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.state_of(TxnId(2)), Some(TxnState::Waiting));

        // An operation against the waiting transaction forces its
        // termination path.
        engine.read(TxnId(2), ITEM1).unwrap();
        assert_eq!(engine.state_of(TxnId(2)), None);

        // The parked operation thread finds its transaction gone on wake-up.
        engine.commit(TxnId(1)).unwrap();
        let err = reader.join().unwrap().unwrap_err();
        assert!(matches!(err, TxnError::UnknownTransaction(TxnId(2))));
        assert_eq!(engine.store().value(ITEM0), Some(1));
    }

    #[test]
    fn test_abort_releases_locks_and_wakes_waiters() {
        let engine = Arc::new(test_engine());
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        engine.write(TxnId(1), ITEM0).unwrap();
        engine.write(TxnId(1), ITEM1).unwrap();
        engine.begin(TxnId(2), TxnKind::ReadWrite).unwrap();

        let e2 = Arc::clone(&engine);
        let writer = thread::spawn(move || e2.write(TxnId(2), ITEM1));
        thread::sleep(Duration::from_millis(50));

        engine.abort(TxnId(1)).unwrap();
        writer.join().unwrap().unwrap();

        assert_eq!(engine.state_of(TxnId(1)), None);
        assert!(engine.lock_table().holds(TxnId(2), 1, ITEM1));
        engine.commit(TxnId(2)).unwrap();
        assert_eq!(engine.lock_table().holder_count(), 0);
    }

    #[test]
    fn test_item_out_of_range() {
        let engine = test_engine();
        engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
        let err = engine.write(TxnId(1), ItemId(99)).unwrap_err();
        assert!(matches!(err, TxnError::ItemOutOfRange(ItemId(99))));
        assert_eq!(engine.lock_table().holder_count(), 0);
    }

    #[test]
    fn test_deadlock_hooks_are_inert() {
        let engine = test_engine();
        assert!(engine.detect_cycles().is_empty());
        assert!(engine.choose_victim(&[TxnId(1), TxnId(2)]).is_none());
    }

    #[test]
    fn test_run_records_errors_without_panicking() {
        let capture = Capture::default();
        let audit = AuditLog::from_writer(capture.clone()).unwrap();
        let engine = TxnEngine::new(&test_config(), audit);

        engine.run(&Operation {
            tid: TxnId(7),
            seq: 0,
            kind: OpKind::Commit,
        });

        let text = capture.contents();
        assert!(text.contains("T7\t\tCommitTx"));
        assert!(text.contains("T7\t\tError"));
    }
}
