//! Ingestion counters
//!
//! Shared between the ingestor (per-sample counters) and the session actor
//! (recent-window flush counters). Relaxed atomics; the values are
//! monitoring hints, not synchronization.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestStats {
    samples_accepted: AtomicU64,
    samples_dropped_idle: AtomicU64,
    sample_write_failures: AtomicU64,
    recent_flushes: AtomicU64,
    recent_flush_failures: AtomicU64,
    projections_dropped: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub samples_accepted: u64,
    pub samples_dropped_idle: u64,
    pub sample_write_failures: u64,
    pub recent_flushes: u64,
    pub recent_flush_failures: u64,
    pub projections_dropped: u64,
}

impl IngestStats {
    pub fn record_accepted(&self) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_idle(&self) {
        self.samples_dropped_idle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.sample_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.recent_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self) {
        self.recent_flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_projection_dropped(&self) {
        self.projections_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_dropped_idle: self.samples_dropped_idle.load(Ordering::Relaxed),
            sample_write_failures: self.sample_write_failures.load(Ordering::Relaxed),
            recent_flushes: self.recent_flushes.load(Ordering::Relaxed),
            recent_flush_failures: self.recent_flush_failures.load(Ordering::Relaxed),
            projections_dropped: self.projections_dropped.load(Ordering::Relaxed),
        }
    }
}
