//! Bounded, thread-safe message queue with drop-on-full backpressure.
//!
//! Producers never block: a push against a full queue is counted and
//! refused. Queue-full is an expected backpressure signal, not an error.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use log::debug;

use sonde_types::Snapshot;

/// FIFO of snapshots awaiting distribution.
pub struct MessageQueue {
    inner: Mutex<VecDeque<Snapshot>>,
    max_size: usize,
    /// Cached length, kept consistent under the same lock that guards
    /// push/pop so `len` stays a lock-free read.
    len: AtomicUsize,
    dropped: AtomicU64,
}

impl MessageQueue {
    pub fn new(max_size: usize) -> Self {
        debug!("message queue created (max size: {})", max_size);
        Self {
            inner: Mutex::new(VecDeque::new()),
            max_size,
            len: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a snapshot. Returns false (and counts the drop) if the
    /// queue is at capacity. Never blocks beyond the short critical
    /// section.
    pub fn push(&self, snapshot: Snapshot) -> bool {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.max_size {
            drop(queue);
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("queue full, dropping message (total dropped: {})", total);
            return false;
        }

        queue.push_back(snapshot);
        self.len.store(queue.len(), Ordering::Release);
        true
    }

    /// Remove and return the oldest snapshot, if any.
    pub fn pop(&self) -> Option<Snapshot> {
        let mut queue = self.inner.lock().unwrap();
        let snapshot = queue.pop_front();
        self.len.store(queue.len(), Ordering::Release);
        snapshot
    }

    /// Pop up to `max_count` snapshots in FIFO order. May return fewer
    /// than requested, including none.
    pub fn pop_batch(&self, max_count: usize) -> Vec<Snapshot> {
        let mut queue = self.inner.lock().unwrap();
        let count = max_count.min(queue.len());
        let batch: Vec<Snapshot> = queue.drain(..count).collect();
        self.len.store(queue.len(), Ordering::Release);
        batch
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Total pushes refused because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discard all queued snapshots without emitting them.
    pub fn clear(&self) {
        let mut queue = self.inner.lock().unwrap();
        let cleared = queue.len();
        queue.clear();
        self.len.store(0, Ordering::Release);
        if cleared > 0 {
            debug!("cleared {} messages from queue", cleared);
        }
    }
}
