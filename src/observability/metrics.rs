//! Metrics registry
//!
//! Exact monotonic counters with relaxed atomics. Reset only on process
//! start; sampled by the stats surface and the CLI.

use std::sync::atomic::{AtomicU64, Ordering};

/// All operational counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    wal_appends: AtomicU64,
    wal_bytes: AtomicU64,
    checkpoints: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    rollback_failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_reductions: AtomicU64,
    pool_acquires: AtomicU64,
    pool_timeouts: AtomicU64,
    queries: AtomicU64,
    slow_queries: AtomicU64,
    backups: AtomicU64,
    backup_failures: AtomicU64,
    propagated_transitions: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        /// Increment the counter.
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        /// Read the counter.
        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl MetricsRegistry {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(inc_wal_appends, wal_appends, wal_appends);
    counter!(inc_checkpoints, checkpoints, checkpoints);
    counter!(inc_commits, commits, commits);
    counter!(inc_rollbacks, rollbacks, rollbacks);
    counter!(inc_rollback_failures, rollback_failures, rollback_failures);
    counter!(inc_cache_hits, cache_hits, cache_hits);
    counter!(inc_cache_misses, cache_misses, cache_misses);
    counter!(inc_cache_reductions, cache_reductions, cache_reductions);
    counter!(inc_pool_acquires, pool_acquires, pool_acquires);
    counter!(inc_pool_timeouts, pool_timeouts, pool_timeouts);
    counter!(inc_queries, queries, queries);
    counter!(inc_slow_queries, slow_queries, slow_queries);
    counter!(inc_backups, backups, backups);
    counter!(inc_backup_failures, backup_failures, backup_failures);
    counter!(
        inc_propagated_transitions,
        propagated_transitions,
        propagated_transitions
    );

    /// Add WAL bytes written.
    pub fn add_wal_bytes(&self, bytes: u64) {
        self.wal_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Read WAL bytes written.
    pub fn wal_bytes(&self) -> u64 {
        self.wal_bytes.load(Ordering::Relaxed)
    }

    /// Sample everything as JSON for the stats surface.
    pub fn sample(&self) -> serde_json::Value {
        serde_json::json!({
            "wal_appends": self.wal_appends(),
            "wal_bytes": self.wal_bytes(),
            "checkpoints": self.checkpoints(),
            "commits": self.commits(),
            "rollbacks": self.rollbacks(),
            "rollback_failures": self.rollback_failures(),
            "cache_hits": self.cache_hits(),
            "cache_misses": self.cache_misses(),
            "cache_reductions": self.cache_reductions(),
            "pool_acquires": self.pool_acquires(),
            "pool_timeouts": self.pool_timeouts(),
            "queries": self.queries(),
            "slow_queries": self.slow_queries(),
            "backups": self.backups(),
            "backup_failures": self.backup_failures(),
            "propagated_transitions": self.propagated_transitions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let metrics = MetricsRegistry::new();
        metrics.inc_commits();
        metrics.inc_commits();
        metrics.inc_rollbacks();
        assert_eq!(metrics.commits(), 2);
        assert_eq!(metrics.rollbacks(), 1);
        assert_eq!(metrics.checkpoints(), 0);
    }

    #[test]
    fn sample_reports_every_counter() {
        let metrics = MetricsRegistry::new();
        metrics.inc_queries();
        let sample = metrics.sample();
        assert_eq!(sample["queries"], 1);
        assert_eq!(sample["backups"], 0);
    }
}
