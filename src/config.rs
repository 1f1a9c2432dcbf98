// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the transaction engine.

/// Configuration for [`TxnEngine`](crate::txn::TxnEngine) initialization.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of data items in the counter store.
    pub item_count: usize,
    /// Maximum number of transaction ids the op-time table covers.
    pub max_transactions: usize,
    /// Seed for the per-transaction op-time table.
    pub op_time_seed: u64,
    /// Upper bound (exclusive) for generated op times, in microseconds.
    pub op_time_range: u64,
    /// Latency weight applied to granted writes.
    pub write_weight: u64,
    /// Latency weight applied to granted reads.
    pub read_weight: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            item_count: 16,
            max_transactions: 64,
            op_time_seed: 7919,
            op_time_range: 40,
            write_weight: 25,
            read_weight: 15,
        }
    }
}

impl EngineConfig {
    /// Sets the number of data items.
    pub fn with_item_count(mut self, count: usize) -> Self {
        self.item_count = count;
        self
    }

    /// Sets the number of transaction ids covered by the op-time table.
    pub fn with_max_transactions(mut self, max: usize) -> Self {
        self.max_transactions = max;
        self
    }

    /// Sets the seed for the op-time table.
    pub fn with_op_time_seed(mut self, seed: u64) -> Self {
        self.op_time_seed = seed;
        self
    }

    /// Sets the upper bound for generated op times, in microseconds.
    pub fn with_op_time_range(mut self, range: u64) -> Self {
        self.op_time_range = range;
        self
    }
}
