// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for the uncontended lock-protocol paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lockplane::{
    AuditLog, EngineConfig, InMemoryLockTable, ItemId, LockHolder, LockMode, LockTable,
    OperationSequencer, TxnEngine, TxnId, TxnKind,
};

fn bench_engine() -> TxnEngine {
    let config = EngineConfig::default().with_op_time_range(1);
    TxnEngine::new(&config, AuditLog::sink())
}

fn bench_begin_commit(c: &mut Criterion) {
    let engine = bench_engine();

    c.bench_function("txn::begin_commit", |b| {
        b.iter(|| {
            engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
            engine.commit(TxnId(1)).unwrap();
        })
    });
}

fn bench_write(c: &mut Criterion) {
    let engine = bench_engine();

    c.bench_function("txn::write", |b| {
        b.iter(|| {
            engine.begin(TxnId(1), TxnKind::ReadWrite).unwrap();
            engine.write(TxnId(1), ItemId(0)).unwrap();
            engine.commit(TxnId(1)).unwrap();
        })
    });
}

fn bench_lock_table(c: &mut Criterion) {
    let table = InMemoryLockTable::new();

    c.bench_function("lock_table::add_remove", |b| {
        b.iter(|| {
            table.add(LockHolder {
                tid: TxnId(1),
                group: 1,
                item: ItemId(0),
                mode: LockMode::Exclusive,
            });
            black_box(table.remove(TxnId(1), 1, ItemId(0)));
        })
    });
}

fn bench_sequencer(c: &mut Criterion) {
    let sequencer = OperationSequencer::new();

    c.bench_function("sequencer::enter_leave", |b| {
        let mut seq = 0i64;
        b.iter(|| {
            sequencer.enter(TxnId(1), seq);
            sequencer.leave(TxnId(1));
            seq -= 1;
        })
    });
}

criterion_group!(
    benches,
    bench_begin_commit,
    bench_write,
    bench_lock_table,
    bench_sequencer
);
criterion_main!(benches);
