//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, writes and evictions.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Stats ==
/// Monotonic counters, reset only by an explicit `reset`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of writes
    pub sets: u64,
    /// Number of explicit deletions
    pub deletes: u64,
    /// Number of eviction runs
    pub cleanups: u64,
    /// Number of entries removed by eviction runs
    pub evicted: u64,
    /// Time of the last eviction run (Unix milliseconds)
    pub last_cleanup: Option<u64>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    // == Record Cleanup ==
    /// Counts one eviction run that removed `removed` entries at `now_ms`.
    pub fn record_cleanup(&mut self, removed: usize, now_ms: u64) {
        self.cleanups += 1;
        self.evicted += removed as u64;
        self.last_cleanup = Some(now_ms);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Stats Report ==
/// Read-only statistics view exposed to operators.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub cleanups: u64,
    pub evicted: u64,
    pub hit_rate: f64,
    pub cache_size: usize,
    pub max_size: usize,
    pub expiry_ms: u64,
    pub enable_persistence: bool,
    pub last_cleanup_at: Option<DateTime<Utc>>,
}

impl CacheStatsReport {
    pub fn from_stats(
        name: &str,
        stats: &CacheStats,
        cache_size: usize,
        max_size: usize,
        expiry_ms: u64,
        enable_persistence: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            cleanups: stats.cleanups,
            evicted: stats.evicted,
            hit_rate: stats.hit_rate(),
            cache_size,
            max_size,
            expiry_ms,
            enable_persistence,
            last_cleanup_at: stats
                .last_cleanup
                .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.cleanups, 0);
        assert!(stats.last_cleanup.is_none());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_cleanup() {
        let mut stats = CacheStats::new();
        stats.record_cleanup(3, 1_000);
        stats.record_cleanup(2, 2_000);
        assert_eq!(stats.cleanups, 2);
        assert_eq!(stats.evicted, 5);
        assert_eq!(stats.last_cleanup, Some(2_000));
    }

    #[test]
    fn test_reset() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_set();
        stats.record_delete();
        stats.record_cleanup(1, 5);
        stats.reset();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_report_serializes_cleanup_time() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_cleanup(1, 0);

        let report = CacheStatsReport::from_stats("t", &stats, 4, 10, 3_600_000, true);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["hit_rate"], 1.0);
        assert_eq!(json["cache_size"], 4);
        assert_eq!(json["last_cleanup_at"], "1970-01-01T00:00:00Z");
    }
}
