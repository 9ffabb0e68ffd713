//! Atomic counters for hot-path metrics
//!
//! Lock-free counters that can be safely updated from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::pool::BufferPool;

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

/// Atomic metrics counters
pub struct Metrics {
    // Queue metrics
    pub queue_adds_accepted: AtomicU64,
    pub queue_adds_rejected: AtomicU64,
    pub queue_drains: AtomicU64,
    pub queue_items_drained: AtomicU64,

    // Pool metrics
    pub pool_hits: AtomicU64,
    pub pool_misses: AtomicU64,
    pub pool_oversized: AtomicU64,
    pub pool_returns_stored: AtomicU64,
    pub pool_returns_dropped: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            queue_adds_accepted: AtomicU64::new(0),
            queue_adds_rejected: AtomicU64::new(0),
            queue_drains: AtomicU64::new(0),
            queue_items_drained: AtomicU64::new(0),
            pool_hits: AtomicU64::new(0),
            pool_misses: AtomicU64::new(0),
            pool_oversized: AtomicU64::new(0),
            pool_returns_stored: AtomicU64::new(0),
            pool_returns_dropped: AtomicU64::new(0),
        }
    }

    // Queue tracking
    #[inline]
    pub fn queue_add_accepted(&self) {
        self.queue_adds_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn queue_add_rejected(&self) {
        self.queue_adds_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn queue_drained(&self, items: u64) {
        self.queue_drains.fetch_add(1, Ordering::Relaxed);
        self.queue_items_drained.fetch_add(items, Ordering::Relaxed);
    }

    // Buffer pool tracking
    #[inline]
    pub fn pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn pool_miss(&self) {
        self.pool_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn pool_oversized(&self) {
        self.pool_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn pool_returned(&self) {
        self.pool_returns_stored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn pool_return_dropped(&self) {
        self.pool_returns_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_adds_accepted: self.queue_adds_accepted.load(Ordering::Relaxed),
            queue_adds_rejected: self.queue_adds_rejected.load(Ordering::Relaxed),
            queue_drains: self.queue_drains.load(Ordering::Relaxed),
            queue_items_drained: self.queue_items_drained.load(Ordering::Relaxed),
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            pool_misses: self.pool_misses.load(Ordering::Relaxed),
            pool_oversized: self.pool_oversized.load(Ordering::Relaxed),
            pool_returns_stored: self.pool_returns_stored.load(Ordering::Relaxed),
            pool_returns_dropped: self.pool_returns_dropped.load(Ordering::Relaxed),
            pool_rented_bytes: BufferPool::rented_total(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub queue_adds_accepted: u64,
    pub queue_adds_rejected: u64,
    pub queue_drains: u64,
    pub queue_items_drained: u64,
    pub pool_hits: u64,
    pub pool_misses: u64,
    pub pool_oversized: u64,
    pub pool_returns_stored: u64,
    pub pool_returns_dropped: u64,
    pub pool_rented_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_counters() {
        let metrics = Metrics::new();
        metrics.queue_add_accepted();
        metrics.queue_add_rejected();
        metrics.queue_drained(3);
        metrics.queue_drained(2);
        metrics.pool_hit();
        metrics.pool_return_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_adds_accepted, 1);
        assert_eq!(snapshot.queue_adds_rejected, 1);
        assert_eq!(snapshot.queue_drains, 2);
        assert_eq!(snapshot.queue_items_drained, 5);
        assert_eq!(snapshot.pool_hits, 1);
        assert_eq!(snapshot.pool_misses, 0);
        assert_eq!(snapshot.pool_returns_dropped, 1);
    }
}
