// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock table trait and types.

use std::fmt;

use super::TxnId;

/// Lock group. The engine keys every lock under a single data group; the
/// table keeps the group in its key so multi-group layouts stay possible.
pub type GroupId = u32;

/// Identifier of a data item (index into the item store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock modes for read/write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock for reads (multiple readers allowed).
    Shared,
    /// Exclusive lock for writes (single writer, no readers).
    Exclusive,
}

impl LockMode {
    /// Lock name as it appears in the audit log.
    pub fn lock_name(&self) -> &'static str {
        match self {
            LockMode::Shared => "ReadLock",
            LockMode::Exclusive => "WriteLock",
        }
    }

    /// Operation name as it appears in the audit log.
    pub fn op_name(&self) -> &'static str {
        match self {
            LockMode::Shared => "readTx",
            LockMode::Exclusive => "writeTx",
        }
    }
}

/// A lock-holder record: one (transaction, item) ownership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    /// Transaction holding this lock.
    pub tid: TxnId,
    /// Lock group the item belongs to.
    pub group: GroupId,
    /// Item being locked.
    pub item: ItemId,
    /// Lock mode (shared or exclusive).
    pub mode: LockMode,
}

/// Lock table interface.
///
/// The engine only needs four operations: locate the current holder(s) of an
/// item, add a holder, remove a holder, and test whether a transaction
/// already holds a lock on an item. Individual calls must be atomic; the
/// engine serializes check-then-add sequences under its own coarse region.
///
/// Invariant maintained by callers: at most one exclusive holder per item,
/// and an exclusive holder is the only holder.
pub trait LockTable: Send + Sync {
    /// Returns every holder record for an item, in insertion order.
    fn holders(&self, group: GroupId, item: ItemId) -> Vec<LockHolder>;

    /// Adds a holder record.
    fn add(&self, holder: LockHolder);

    /// Removes the holder record for `(tid, group, item)`, returning it if it
    /// existed.
    fn remove(&self, tid: TxnId, group: GroupId, item: ItemId) -> Option<LockHolder>;

    /// Returns true if `tid` holds a lock on `item`.
    fn holds(&self, tid: TxnId, group: GroupId, item: ItemId) -> bool;
}
