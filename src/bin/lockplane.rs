// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Workload driver.
//!
//! Reads a workload file, runs it through the transaction engine with one
//! thread per operation, and writes the audit log.
//!
//! Usage:
//!   lockplane <workload-file> [<audit-log-path>]
//!
//! Exit codes: 0 on clean teardown, 1 on an unreadable or malformed
//! workload, 2 when the audit log cannot be opened.

use std::sync::Arc;

use tracing::{error, info};

use lockplane::{AuditLog, Dispatcher, EngineConfig, TxnEngine};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    std::process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    let Some(workload_path) = args.get(1) else {
        eprintln!("usage: lockplane <workload-file> [<audit-log-path>]");
        return 1;
    };
    let log_path = args.get(2).map(String::as_str).unwrap_or("lockplane.log");

    let text = match std::fs::read_to_string(workload_path) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %workload_path, error = %err, "cannot read workload");
            return 1;
        }
    };
    let workload = match lockplane::workload::parse(&text) {
        Ok(workload) => workload,
        Err(err) => {
            error!(path = %workload_path, error = %err, "malformed workload");
            return 1;
        }
    };

    // Audit-log failure is fatal before any workload processing starts.
    let audit = match AuditLog::create(log_path) {
        Ok(audit) => audit,
        Err(err) => {
            error!(error = %err, "setup failed");
            return 2;
        }
    };

    let default_items = EngineConfig::default().item_count;
    let item_count = workload
        .max_item()
        .map_or(default_items, |item| (item.0 as usize + 1).max(default_items));
    let config = EngineConfig::default().with_item_count(item_count);

    let engine = Arc::new(TxnEngine::new(&config, audit));
    Dispatcher::run(Arc::clone(&engine), &workload);

    info!(
        operations = workload.ops.len(),
        items = ?engine.store().snapshot(),
        "workload complete"
    );
    0
}
