//! Log manager statistics.
//!
//! Counters are atomic and can be read while writes and compactions are in
//! progress. All of them only ever increase.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters kept by the log manager.
#[derive(Debug, Default)]
pub struct ManagerStats {
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    records_replayed: AtomicU64,
    anomalies: AtomicU64,
    torn_tails_discarded: AtomicU64,
    compactions_completed: AtomicU64,
    compactions_skipped: AtomicU64,
    compactions_failed: AtomicU64,
    records_compacted_away: AtomicU64,
    segments_removed: AtomicU64,
}

/// A point-in-time copy of [`ManagerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records appended through the write path.
    pub records_written: u64,
    /// Bytes appended through the write path.
    pub bytes_written: u64,
    /// Records applied during recovery.
    pub records_replayed: u64,
    /// Records that could not be applied (unrecognized operation and such).
    pub anomalies: u64,
    /// Segments whose torn trailing record was cut during recovery.
    pub torn_tails_discarded: u64,
    /// Compaction cycles that finished.
    pub compactions_completed: u64,
    /// Cycles skipped because another was running.
    pub compactions_skipped: u64,
    /// Cycles that returned an error.
    pub compactions_failed: u64,
    /// Records removed by compaction.
    pub records_compacted_away: u64,
    /// Empty sealed segments deleted after compaction.
    pub segments_removed: u64,
}

impl ManagerStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_replayed(&self, records: u64) {
        self.records_replayed.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_torn_tail(&self) {
        self.torn_tails_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self, records_removed: u64) {
        self.compactions_completed.fetch_add(1, Ordering::Relaxed);
        self.records_compacted_away
            .fetch_add(records_removed, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction_skipped(&self) {
        self.compactions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction_failed(&self) {
        self.compactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_removed(&self) {
        self.segments_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            records_replayed: self.records_replayed.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            torn_tails_discarded: self.torn_tails_discarded.load(Ordering::Relaxed),
            compactions_completed: self.compactions_completed.load(Ordering::Relaxed),
            compactions_skipped: self.compactions_skipped.load(Ordering::Relaxed),
            compactions_failed: self.compactions_failed.load(Ordering::Relaxed),
            records_compacted_away: self.records_compacted_away.load(Ordering::Relaxed),
            segments_removed: self.segments_removed.load(Ordering::Relaxed),
        }
    }
}
