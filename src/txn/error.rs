// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use std::path::PathBuf;

use super::lock::ItemId;
use super::TxnId;

/// Errors raised by individual transaction operations.
///
/// All of these are handled locally by the operation thread that hit them:
/// logged to the audit log and the operator console, then the thread exits
/// without effect. None of them crash the process.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    /// Operation references an id that was never begun or already finished.
    #[error("unknown transaction T{0}")]
    UnknownTransaction(TxnId),

    /// Begin issued for an id that is still live.
    #[error("transaction T{0} already begun")]
    AlreadyBegun(TxnId),

    /// Commit/abort issued against an id already removed.
    #[error("duplicate termination of transaction T{0}")]
    DuplicateTermination(TxnId),

    /// Operation references an item outside the store.
    #[error("item {0} out of range")]
    ItemOutOfRange(ItemId),
}

/// Setup-time failures. These are fatal: the process exits with a non-zero
/// code before any workload processing.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cannot open audit log {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read workload {path}: {source}")]
    Workload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
