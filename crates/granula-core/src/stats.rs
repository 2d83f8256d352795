//! Engine counters shared across checker, history and search.
//!
//! All counters are `AtomicU64` so worker threads can record without locks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free counters for one anonymization run.
#[derive(Debug, Default)]
pub struct EngineStats {
    checks: AtomicU64,
    full_scans: AtomicU64,
    representative_scans: AtomicU64,
    snapshot_scans: AtomicU64,
    history_hits: AtomicU64,
    history_misses: AtomicU64,
    snapshots_stored: AtomicU64,
    snapshots_evicted: AtomicU64,
    nodes_pruned: AtomicU64,
    mechanism_draws: AtomicU64,
}

impl EngineStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one transformation check.
    #[inline]
    pub fn record_check(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scan over every input row.
    #[inline]
    pub fn record_full_scan(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scan over the representatives of the previous grouping.
    #[inline]
    pub fn record_representative_scan(&self) {
        self.representative_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scan over a history snapshot.
    #[inline]
    pub fn record_snapshot_scan(&self) {
        self.snapshot_scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a history lookup outcome.
    #[inline]
    pub fn record_history_lookup(&self, hit: bool) {
        if hit {
            self.history_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.history_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a stored snapshot.
    #[inline]
    pub fn record_snapshot_stored(&self) {
        self.snapshots_stored.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the eviction count reported by the history.
    #[inline]
    pub fn set_snapshots_evicted(&self, evicted: u64) {
        self.snapshots_evicted.store(evicted, Ordering::Relaxed);
    }

    /// Record a transformation skipped by pruning.
    #[inline]
    pub fn record_pruned(&self) {
        self.nodes_pruned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one exponential-mechanism draw.
    #[inline]
    pub fn record_mechanism_draw(&self) {
        self.mechanism_draws.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            full_scans: self.full_scans.load(Ordering::Relaxed),
            representative_scans: self.representative_scans.load(Ordering::Relaxed),
            snapshot_scans: self.snapshot_scans.load(Ordering::Relaxed),
            history_hits: self.history_hits.load(Ordering::Relaxed),
            history_misses: self.history_misses.load(Ordering::Relaxed),
            snapshots_stored: self.snapshots_stored.load(Ordering::Relaxed),
            snapshots_evicted: self.snapshots_evicted.load(Ordering::Relaxed),
            nodes_pruned: self.nodes_pruned.load(Ordering::Relaxed),
            mechanism_draws: self.mechanism_draws.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`EngineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Transformations checked.
    pub checks: u64,
    /// Scans over all input rows.
    pub full_scans: u64,
    /// Scans over previous representatives.
    pub representative_scans: u64,
    /// Scans over history snapshots.
    pub snapshot_scans: u64,
    /// History lookups that found a snapshot.
    pub history_hits: u64,
    /// History lookups that found nothing.
    pub history_misses: u64,
    /// Snapshots stored.
    pub snapshots_stored: u64,
    /// Snapshots evicted.
    pub snapshots_evicted: u64,
    /// Transformations skipped by pruning.
    pub nodes_pruned: u64,
    /// Exponential-mechanism draws.
    pub mechanism_draws: u64,
}

impl StatsSnapshot {
    /// Ratio of history hits to lookups.
    pub fn history_hit_rate(&self) -> f64 {
        let total = self.history_hits + self.history_misses;
        if total == 0 {
            0.0
        } else {
            self.history_hits as f64 / total as f64
        }
    }
}
