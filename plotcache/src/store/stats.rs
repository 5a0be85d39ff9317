//! Artifact store statistics.
//!
//! Counters are atomics so the store can record from any task without
//! touching the index lock; readers take a [`StoreStatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by the store.
#[derive(Debug, Default)]
pub struct StoreStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    written_bytes: AtomicU64,
    evictions: AtomicU64,
    evicted_bytes: AtomicU64,
    expired: AtomicU64,
    failures: AtomicU64,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.written_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64, bytes: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
        self.evicted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters.
    pub fn snapshot(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            written_bytes: self.written_bytes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            evicted_bytes: self.evicted_bytes.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub written_bytes: u64,
    pub evictions: u64,
    pub evicted_bytes: u64,
    pub expired: u64,
    pub failures: u64,
}

impl StoreStatsSnapshot {
    /// Hit rate over reads, 0.0 to 1.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let stats = StoreStats::new();
        let snap = stats.snapshot();

        assert_eq!(snap, StoreStatsSnapshot::default());
        assert_eq!(snap.hit_rate(), 0.0);
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = StoreStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_write(1_024);
        stats.record_write(2_048);
        stats.record_evictions(3, 4_096);
        stats.record_expired(2);
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.writes, 2);
        assert_eq!(snap.written_bytes, 3_072);
        assert_eq!(snap.evictions, 3);
        assert_eq!(snap.evicted_bytes, 4_096);
        assert_eq!(snap.expired, 2);
        assert_eq!(snap.failures, 1);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = StoreStats::new();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();

        assert_eq!(stats.snapshot().hit_rate(), 0.75);
    }
}
