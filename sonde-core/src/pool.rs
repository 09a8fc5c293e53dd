//! Allocation statistics for snapshot construction.
//!
//! Snapshots are allocated by the global allocator; this tracks how many
//! are live in the pipeline at once and the high-water mark, which is what
//! observers use to size buffers.

use std::sync::Mutex;

/// Counters describing snapshot allocation behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Snapshots currently in flight (enqueued but not yet distributed).
    pub live: usize,
    /// Highest `live` value observed since the last reset.
    pub peak: usize,
    /// Total snapshots ever constructed through the pipeline.
    pub total_allocations: u64,
}

/// Tracks snapshot allocation statistics for the pipeline.
#[derive(Default)]
pub struct MessagePool {
    stats: Mutex<PoolStats>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot entering the pipeline.
    pub fn note_allocated(&self) {
        let mut stats = self.stats.lock().unwrap();
        stats.live += 1;
        stats.total_allocations += 1;
        if stats.live > stats.peak {
            stats.peak = stats.live;
        }
    }

    /// Record a snapshot leaving the pipeline (distributed or dropped).
    pub fn note_released(&self) {
        let mut stats = self.stats.lock().unwrap();
        stats.live = stats.live.saturating_sub(1);
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock().unwrap()
    }

    pub fn reset(&self) {
        *self.stats.lock().unwrap() = PoolStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_peak_and_total() {
        let pool = MessagePool::new();
        pool.note_allocated();
        pool.note_allocated();
        pool.note_allocated();
        pool.note_released();

        let stats = pool.stats();
        assert_eq!(stats.live, 2);
        assert_eq!(stats.peak, 3);
        assert_eq!(stats.total_allocations, 3);
    }

    #[test]
    fn release_never_underflows() {
        let pool = MessagePool::new();
        pool.note_released();
        assert_eq!(pool.stats().live, 0);
    }

    #[test]
    fn reset_clears_counters() {
        let pool = MessagePool::new();
        pool.note_allocated();
        pool.reset();
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
