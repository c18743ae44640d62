//! Per-process operation counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Atomic counters owned by one backend handle
#[derive(Debug)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
    flushes: AtomicU64,
    errors: AtomicU64,
    bytes_written: AtomicU64,
    stats_since: SystemTime,
}

impl Default for StatsCounters {
    fn default() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removals: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            stats_since: SystemTime::now(),
        }
    }
}

impl StatsCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, size: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            stats_since: self.stats_since,
        }
    }
}

/// Point-in-time copy of a handle's counters.
///
/// Counts only operations made through this handle; other processes keep
/// their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub removals: u64,
    pub flushes: u64,
    pub errors: u64,
    pub bytes_written: u64,
    pub stats_since: SystemTime,
}

impl CacheStatistics {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    pub fn total_operations(&self) -> u64 {
        self.hits + self.misses + self.writes + self.removals + self.flushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let counters = StatsCounters::default();
        assert_eq!(counters.snapshot().hit_rate(), 0.0);
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        let stats = counters.snapshot();
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_operations(), 4);
    }

    #[test]
    fn test_write_accounting() {
        let counters = StatsCounters::default();
        counters.record_write(10);
        counters.record_write(22);
        counters.record_removal();
        let stats = counters.snapshot();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.bytes_written, 32);
        assert_eq!(stats.removals, 1);
    }
}
