// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Global transaction registry.

use std::collections::HashMap;

use super::error::TxnError;
use super::transaction::{Transaction, TxnId, TxnKind};

/// Process-wide mapping from transaction id to transaction record.
///
/// The registry is a plain arena keyed by id; the engine guards it with one
/// coarse mutex so that all registry and lock-table edits form a single
/// serialized region. That lock is never held across a blocking wait.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    txns: HashMap<TxnId, Transaction>,
}

impl TransactionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new active transaction.
    ///
    /// Fails if the id is already live; ids must not be reused while the
    /// previous transaction is still registered.
    pub fn register(&mut self, tid: TxnId, kind: TxnKind) -> Result<(), TxnError> {
        if self.txns.contains_key(&tid) {
            return Err(TxnError::AlreadyBegun(tid));
        }
        self.txns.insert(tid, Transaction::new(tid, kind));
        Ok(())
    }

    /// Looks up a transaction by id.
    pub fn lookup(&self, tid: TxnId) -> Option<&Transaction> {
        self.txns.get(&tid)
    }

    /// Looks up a transaction by id for mutation.
    pub fn lookup_mut(&mut self, tid: TxnId) -> Option<&mut Transaction> {
        self.txns.get_mut(&tid)
    }

    /// Removes a transaction, returning its record.
    ///
    /// An absent id signals a protocol violation (double commit/abort); the
    /// caller logs it and continues.
    pub fn unregister(&mut self, tid: TxnId) -> Result<Transaction, TxnError> {
        self.txns
            .remove(&tid)
            .ok_or(TxnError::DuplicateTermination(tid))
    }

    /// Number of live transactions.
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// Returns true if no transactions are live.
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// Iterates over the live transactions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.txns.values()
    }
}
