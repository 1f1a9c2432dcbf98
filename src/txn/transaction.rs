// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction types and state management.

use std::fmt;

use super::lock::{ItemId, LockMode};

/// Unique transaction identifier, assigned by the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction kind, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    /// Read-only transaction.
    ReadOnly,
    /// Read-write transaction.
    ReadWrite,
}

impl TxnKind {
    /// One-character tag used in the audit log.
    pub fn as_char(&self) -> char {
        match self {
            TxnKind::ReadOnly => 'R',
            TxnKind::ReadWrite => 'W',
        }
    }
}

/// Transaction state.
///
/// `Active` is the initial state; a transaction moves to `Waiting` while it
/// is blocked acquiring a lock and back to `Active` when the holder releases.
/// `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Waiting,
    Committed,
    Aborted,
}

impl TxnState {
    /// One-character tag used in the audit log's TxStatus column.
    pub fn as_char(&self) -> char {
        match self {
            TxnState::Active => 'A',
            TxnState::Waiting => 'W',
            TxnState::Committed => 'C',
            TxnState::Aborted => 'X',
        }
    }
}

/// A live transaction record, owned by the registry.
///
/// Tracks the lock currently being requested while waiting, the transaction
/// being waited on, and every item this transaction holds a lock on (for bulk
/// release at commit/abort).
#[derive(Debug)]
pub struct Transaction {
    pub(crate) tid: TxnId,
    pub(crate) kind: TxnKind,
    pub(crate) state: TxnState,
    /// Mode of the lock currently being requested during a wait.
    pub(crate) lock_mode: Option<LockMode>,
    /// Item currently being waited on.
    pub(crate) pending_item: Option<ItemId>,
    /// Transaction this one is blocked behind.
    pub(crate) waiting_on: Option<TxnId>,
    /// Items this transaction holds a lock on.
    pub(crate) held: Vec<ItemId>,
}

impl Transaction {
    /// Creates a new active transaction.
    pub fn new(tid: TxnId, kind: TxnKind) -> Self {
        Self {
            tid,
            kind,
            state: TxnState::Active,
            lock_mode: None,
            pending_item: None,
            waiting_on: None,
            held: Vec::new(),
        }
    }

    /// Returns the transaction id.
    #[inline]
    pub fn tid(&self) -> TxnId {
        self.tid
    }

    /// Returns the transaction kind.
    #[inline]
    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Returns the transaction this one is blocked behind, if any.
    #[inline]
    pub fn waiting_on(&self) -> Option<TxnId> {
        self.waiting_on
    }

    /// Items this transaction currently holds locks on.
    #[inline]
    pub fn held_items(&self) -> &[ItemId] {
        &self.held
    }

    /// Marks the transaction as blocked acquiring `mode` on `item`, behind
    /// `holder`.
    pub(crate) fn mark_waiting(&mut self, item: ItemId, mode: LockMode, holder: TxnId) {
        self.state = TxnState::Waiting;
        self.pending_item = Some(item);
        self.lock_mode = Some(mode);
        self.waiting_on = Some(holder);
    }

    /// Clears the waiting markers after the holder released.
    pub(crate) fn mark_resumed(&mut self) {
        self.state = TxnState::Active;
        self.pending_item = None;
        self.lock_mode = None;
        self.waiting_on = None;
    }
}
