// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction concurrency-control core.
//!
//! This module implements strict shared/exclusive locking over a set of data
//! items, with every operation of a workload dispatched onto its own thread:
//!
//! - The **registry** is the process-wide arena of live transactions, edited
//!   only under one coarse mutex.
//! - The **sequencer** forces a transaction's operation threads into the
//!   exact order the workload issued them, via a blocking rendezvous on a
//!   per-transaction cursor.
//! - The **lock table** records holder edges per `(group, item)`; the
//!   **wait registry** parks transactions that lose a conflict on a counting
//!   semaphore keyed by the holder's id.
//! - The **engine** ties these together: grant, queue, release, wake.
//!
//! # Compatibility rule
//!
//! An exclusive request always conflicts with an existing holder. A shared
//! request conflicts with an exclusive holder, and joins shared holders only
//! when no one is already queued behind them; otherwise it queues too, which
//! keeps lock handoff approximately first-come-first-served.
//!
//! # Liveness
//!
//! Waiters are released in a broadcast when the holder commits or aborts and
//! then re-run their conflict check. Circular waits are neither detected nor
//! broken; the [`TxnEngine::detect_cycles`] / [`TxnEngine::choose_victim`]
//! hooks exist for an external detector. A transaction caught in a cycle
//! stays `Waiting` forever, a documented limitation of the base protocol.
//!
//! # Example
//!
//! ```
//! use lockplane::{AuditLog, EngineConfig, ItemStore, TxnEngine, TxnId, TxnKind, ItemId};
//!
//! let config = EngineConfig::default();
//! let engine = TxnEngine::new(&config, AuditLog::sink());
//!
//! engine.begin(TxnId(1), TxnKind::ReadWrite)?;
//! engine.write(TxnId(1), ItemId(0))?;
//! engine.commit(TxnId(1))?;
//!
//! assert_eq!(engine.store().value(ItemId(0)), Some(1));
//! # Ok::<(), lockplane::TxnError>(())
//! ```

mod error;
mod lock;
mod manager;
mod registry;
mod sequencer;
mod table;
mod transaction;
mod waitlist;

pub use error::{SetupError, TxnError};
pub use lock::{GroupId, ItemId, LockHolder, LockMode, LockTable};
pub use manager::{OpKind, Operation, TxnEngine};
pub use registry::TransactionRegistry;
pub use sequencer::OperationSequencer;
pub use table::InMemoryLockTable;
pub use transaction::{Transaction, TxnId, TxnKind, TxnState};
pub use waitlist::{WaitGuard, WaitRegistry};
