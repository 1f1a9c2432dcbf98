// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! lockplane: a transaction concurrency-control engine.
//!
//! This crate implements the core of a lock-based transaction scheduler:
//! a global transaction registry, a per-item shared/exclusive lock table
//! protocol (acquire, conflict detection, queued waiting, release, wake-up),
//! and a per-transaction operation sequencer that makes concurrently
//! dispatched operation threads behave as an in-order stream per transaction.
//!
//! The "data" being locked is a synthetic counter store; reads decrement and
//! writes increment, which is enough to make interleaving bugs visible in the
//! audit log without carrying real storage semantics.

pub mod audit;
pub mod config;
pub mod store;
pub mod txn;
pub mod workload;

pub use audit::AuditLog;
pub use config::EngineConfig;
pub use store::{CounterStore, ItemStore};
pub use txn::{
    InMemoryLockTable, ItemId, LockHolder, LockMode, LockTable, OpKind, Operation,
    OperationSequencer, SetupError, Transaction, TransactionRegistry, TxnEngine, TxnError, TxnId,
    TxnKind, TxnState, WaitRegistry,
};
pub use workload::{Dispatcher, ParseError, Workload, WorkloadOp};
