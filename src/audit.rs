// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Append-only audit log.
//!
//! One record per operation outcome, in a fixed tab-separated layout with a
//! header row naming the columns. The file is opened in truncate mode at
//! startup and every record is flushed as soon as it is written, so the log
//! is a faithful trace of the interleaving even if the process dies.
//!
//! Writes are serialized by a single mutex around the sink; records never
//! interleave, and no cross-operation coordination is required.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::txn::{ItemId, LockMode, SetupError, TxnId, TxnKind, TxnState};

const HEADER_RULE: &str =
    "---------------------------------------------------------------------------";
const HEADER_COLUMNS: &str =
    "TxId\tTxType\tOperation\tObjId:ObjValue:OpTime\tLockType\tStatus\tTxStatus";

/// Append-only audit sink with one open handle for the process lifetime.
pub struct AuditLog {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Opens the log file in truncate-then-append mode and writes the header.
    ///
    /// Failure here is fatal to the process (exit code 2 in the binary).
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let open = |p: &Path| -> io::Result<Self> {
            let file = File::create(p)?;
            Self::from_writer(file)
        };
        open(path).map_err(|source| SetupError::AuditLog {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Wraps an arbitrary sink, writing the header immediately.
    ///
    /// Used by tests to capture records in memory.
    pub fn from_writer(writer: impl Write + Send + 'static) -> io::Result<Self> {
        let log = Self {
            writer: Mutex::new(BufWriter::new(Box::new(writer))),
        };
        log.record(format_args!("{HEADER_RULE}\n{HEADER_COLUMNS}"))?;
        Ok(log)
    }

    /// A log that discards every record, for benchmarks and tests that do
    /// not inspect output.
    pub fn sink() -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(Box::new(io::sink()))),
        }
    }

    fn record(&self, args: std::fmt::Arguments<'_>) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{args}")?;
        writer.flush()
    }

    /// Records a `BeginTx` with the transaction kind.
    pub fn begin(&self, tid: TxnId, kind: TxnKind) -> io::Result<()> {
        self.record(format_args!("T{tid}\t{}\tBeginTx", kind.as_char()))
    }

    /// Records a granted read/write: item, post-operation value, op time,
    /// lock kind, and the transaction's status.
    pub fn granted(
        &self,
        tid: TxnId,
        mode: LockMode,
        item: ItemId,
        value: i64,
        op_time: u64,
        state: TxnState,
    ) -> io::Result<()> {
        self.record(format_args!(
            "T{tid}\t\t{}\t{item}:{value}:{op_time}\t{}\tGranted\t{}",
            mode.op_name(),
            mode.lock_name(),
            state.as_char(),
        ))
    }

    /// Records a commit or abort outcome.
    pub fn outcome(&self, tid: TxnId, outcome: TxnState) -> io::Result<()> {
        let keyword = match outcome {
            TxnState::Committed => "CommitTx",
            TxnState::Aborted => "AbortTx",
            // Forced termination of a non-active transaction has no outcome
            // keyword of its own.
            TxnState::Active | TxnState::Waiting => return Ok(()),
        };
        self.record(format_args!("T{tid}\t\t{keyword}"))
    }

    /// Records the items released at commit/abort with their post-release
    /// values.
    pub fn released(&self, tid: TxnId, released: &[(ItemId, i64)]) -> io::Result<()> {
        if released.is_empty() {
            return Ok(());
        }
        let listing = released
            .iter()
            .map(|(item, value)| format!("{item}:{value}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.record(format_args!("T{tid}\t\tReleases\t{listing}"))
    }

    /// Records a per-operation error (unknown transaction, protocol
    /// violation).
    pub fn protocol_error(&self, tid: TxnId, message: &str) -> io::Result<()> {
        self.record(format_args!("T{tid}\t\tError\t{message}"))
    }

    /// Flushes the underlying sink.
    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}
