// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Wait registry: per-transaction counting semaphores.
//!
//! A transaction blocked on a lock conflict waits on the semaphore keyed by
//! the holder's transaction id; the holder's commit/abort path signals the
//! semaphore once per queued waiter, releasing all of them together. Each
//! released waiter re-runs its conflict check, so residual conflicts among
//! the released group resolve themselves downstream.
//!
//! Registration and blocking are split: [`WaitRegistry::prepare`] is called
//! while the engine still holds its coarse structural lock, so a holder that
//! finishes immediately afterwards counts the waiter and leaves a permit for
//! it. The actual block in [`WaitGuard::wait`] happens outside that lock and
//! consumes a permit whenever one is available. No wake-up can be lost.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::TxnId;

#[derive(Default)]
struct Queue {
    permits: usize,
    waiters: usize,
}

#[derive(Default)]
struct Entry {
    queue: Mutex<Queue>,
    released: Condvar,
}

/// Registered waiter on another transaction's semaphore.
///
/// Created by [`WaitRegistry::prepare`]; the waiter is counted from that
/// moment. Dropping the guard without waiting deregisters it.
pub struct WaitGuard {
    entry: Arc<Entry>,
    registered: bool,
}

impl WaitGuard {
    /// Blocks until a permit is available, then consumes it.
    pub fn wait(mut self) {
        let mut queue = self.entry.queue.lock();
        while queue.permits == 0 {
            self.entry.released.wait(&mut queue);
        }
        queue.permits -= 1;
        queue.waiters -= 1;
        self.registered = false;
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.registered {
            self.entry.queue.lock().waiters -= 1;
        }
    }
}

/// Per-transaction counting semaphore pool, grown on demand.
#[derive(Default)]
pub struct WaitRegistry {
    entries: Mutex<HashMap<TxnId, Arc<Entry>>>,
}

impl WaitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, tid: TxnId) -> Arc<Entry> {
        Arc::clone(self.entries.lock().entry(tid).or_default())
    }

    /// Registers the calling thread as a waiter on `tid`'s semaphore.
    ///
    /// Must be called before the caller publishes that it is waiting (i.e.
    /// while holding the lock that the releasing side also takes), then
    /// followed by [`WaitGuard::wait`] outside that lock.
    pub fn prepare(&self, tid: TxnId) -> WaitGuard {
        let entry = self.entry(tid);
        entry.queue.lock().waiters += 1;
        WaitGuard {
            entry,
            registered: true,
        }
    }

    /// Grants one permit on `tid`'s semaphore, waking a blocked waiter.
    pub fn signal(&self, tid: TxnId) {
        let entry = self.entry(tid);
        let mut queue = entry.queue.lock();
        queue.permits += 1;
        entry.released.notify_all();
    }

    /// Number of transactions currently registered as waiting on `tid`.
    pub fn waiter_count(&self, tid: TxnId) -> usize {
        self.entry(tid).queue.lock().waiters
    }

    /// Clears any leftover permits on `tid`'s semaphore.
    pub fn reset(&self, tid: TxnId) {
        self.entry(tid).queue.lock().permits = 0;
    }

    /// Drops every semaphore. Only safe once all operation threads are
    /// joined.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_waiter_count_tracks_prepare_and_wait() {
        let reg = WaitRegistry::new();
        assert_eq!(reg.waiter_count(TxnId(1)), 0);

        let guard = reg.prepare(TxnId(1));
        assert_eq!(reg.waiter_count(TxnId(1)), 1);

        reg.signal(TxnId(1));
        guard.wait();
        assert_eq!(reg.waiter_count(TxnId(1)), 0);
    }

    #[test]
    fn test_signal_before_wait_is_not_lost() {
        let reg = WaitRegistry::new();
        let guard = reg.prepare(TxnId(1));

        // Releaser runs to completion before the waiter ever blocks.
        reg.signal(TxnId(1));

        // Does not hang: the permit was banked.
        guard.wait();
    }

    #[test]
    fn test_dropped_guard_deregisters() {
        let reg = WaitRegistry::new();
        let guard = reg.prepare(TxnId(1));
        assert_eq!(reg.waiter_count(TxnId(1)), 1);
        drop(guard);
        assert_eq!(reg.waiter_count(TxnId(1)), 0);
    }

    #[test]
    fn test_broadcast_release_wakes_all_waiters() {
        let reg = Arc::new(WaitRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..3 {
            let guard = reg.prepare(TxnId(9));
            handles.push(thread::spawn(move || guard.wait()));
        }
        thread::sleep(Duration::from_millis(30));
        assert_eq!(reg.waiter_count(TxnId(9)), 3);

        // Release all of them together, one signal per waiter.
        for _ in 0..reg.waiter_count(TxnId(9)) {
            reg.signal(TxnId(9));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.waiter_count(TxnId(9)), 0);
    }

    #[test]
    fn test_reset_discards_stale_permits() {
        let reg = WaitRegistry::new();
        reg.signal(TxnId(1));
        reg.reset(TxnId(1));

        // A fresh waiter must block until signaled again.
        let guard = reg.prepare(TxnId(1));
        let reg = Arc::new(reg);
        let r = Arc::clone(&reg);
        let h = thread::spawn(move || guard.wait());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(r.waiter_count(TxnId(1)), 1);
        r.signal(TxnId(1));
        h.join().unwrap();
    }
}
