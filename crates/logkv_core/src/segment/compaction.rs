//! Last-write-wins reduction of a sealed segment.
//!
//! A sealed segment shrinks to one record per key. Nothing here touches
//! disk: [`crate::LogManager`] picks the segment, feeds its records in and
//! rewrites the file with what comes out.
//!
//! Guarantees:
//!
//! - Compaction **MUST NOT** change what replay produces
//! - The last record per key in file order wins, whether `set` or `delete`
//! - `delete` records survive by default: an older segment may still hold
//!   a `set` for the same key
//! - Output is sorted by key, so compacting twice yields the same records

use crate::record::{Operation, Record};
use std::collections::BTreeMap;

/// Knobs for [`Compactor`].
#[derive(Debug, Clone, Default)]
pub struct CompactionConfig {
    /// Drop surviving `delete` records when the segment being compacted is
    /// the oldest one in the log. No earlier segment can hold those keys, so
    /// the deletes have nothing left to cancel.
    pub drop_tombstones_in_oldest: bool,
}

impl CompactionConfig {
    /// Creates a config that keeps every surviving delete.
    #[must_use]
    pub fn keep_tombstones() -> Self {
        Self::default()
    }

    /// Creates a config that drops deletes from the oldest segment.
    #[must_use]
    pub fn drop_tombstones_in_oldest() -> Self {
        Self {
            drop_tombstones_in_oldest: true,
        }
    }
}

/// Counters describing one reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Records handed to the compactor.
    pub input_records: usize,
    /// Records it kept.
    pub output_records: usize,
    /// Records superseded by a later record for the same key.
    pub obsolete_records_removed: usize,
    /// Surviving deletes dropped because the segment was the oldest.
    pub tombstones_removed: usize,
    /// Records with an unrecognized operation, which carry no state.
    pub anomalies_dropped: usize,
}

impl CompactionResult {
    /// Total number of records removed.
    #[must_use]
    pub fn records_removed(&self) -> usize {
        self.input_records - self.output_records
    }
}

/// Keeps the final record per key and drops the rest.
///
/// ```rust
/// use logkv_core::{Compactor, Record, Value};
///
/// let records = vec![
///     Record::set("a", Value::string("1", 1)),
///     Record::set("a", Value::string("2", 2)),
/// ];
/// let (output, stats) = Compactor::with_defaults().compact(records, false);
/// assert_eq!(output, vec![Record::set("a", Value::string("2", 2))]);
/// assert_eq!(stats.obsolete_records_removed, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compactor {
    config: CompactionConfig,
}

impl Compactor {
    /// Builds a compactor from `config`.
    #[must_use]
    pub fn new(config: CompactionConfig) -> Self {
        Self { config }
    }

    /// Builds a compactor that keeps every surviving delete.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CompactionConfig::default())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Reduces `records` (in file order) to the last record per key.
    ///
    /// `is_oldest` says whether the records come from the oldest segment in
    /// the log, which enables tombstone dropping when configured.
    #[must_use]
    pub fn compact(&self, records: Vec<Record>, is_oldest: bool) -> (Vec<Record>, CompactionResult) {
        let input_records = records.len();
        let mut latest: BTreeMap<String, Record> = BTreeMap::new();
        let mut obsolete_records_removed = 0usize;
        let mut anomalies_dropped = 0usize;

        for record in records {
            if let Operation::Unrecognized(_) = record.operation {
                anomalies_dropped += 1;
                continue;
            }
            if latest.insert(record.key.clone(), record).is_some() {
                obsolete_records_removed += 1;
            }
        }

        let drop_tombstones = is_oldest && self.config.drop_tombstones_in_oldest;
        let mut tombstones_removed = 0usize;
        let mut output = Vec::with_capacity(latest.len());

        // BTreeMap iteration gives key order.
        for (_, record) in latest {
            if drop_tombstones && record.is_delete() {
                tombstones_removed += 1;
            } else {
                output.push(record);
            }
        }

        let result = CompactionResult {
            input_records,
            output_records: output.len(),
            obsolete_records_removed,
            tombstones_removed,
            anomalies_dropped,
        };

        (output, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn set(key: &str, value: &str, version: u64) -> Record {
        Record::set(key, Value::string(value, version))
    }

    #[test]
    fn compact_keeps_last_write() {
        let compactor = Compactor::with_defaults();

        let records = vec![set("a", "v1", 1), set("a", "v2", 2), set("a", "v3", 3)];
        let (output, stats) = compactor.compact(records, false);

        assert_eq!(output, vec![set("a", "v3", 3)]);
        assert_eq!(stats.obsolete_records_removed, 2);
        assert_eq!(stats.records_removed(), 2);
    }

    #[test]
    fn file_order_wins_over_version() {
        let compactor = Compactor::with_defaults();

        // A producer may write a lower version later; replay applies it last.
        let records = vec![set("a", "new", 9), set("a", "late", 4)];
        let (output, _) = compactor.compact(records, false);

        assert_eq!(output, vec![set("a", "late", 4)]);
    }

    #[test]
    fn trailing_delete_survives() {
        let compactor = Compactor::with_defaults();

        let records = vec![set("a", "1", 1), Record::delete("a"), set("b", "2", 2)];
        let (output, stats) = compactor.compact(records, true);

        assert_eq!(output, vec![Record::delete("a"), set("b", "2", 2)]);
        assert_eq!(stats.tombstones_removed, 0);
    }

    #[test]
    fn set_after_delete_survives() {
        let compactor = Compactor::with_defaults();

        let records = vec![Record::delete("a"), set("a", "back", 2)];
        let (output, _) = compactor.compact(records, false);

        assert_eq!(output, vec![set("a", "back", 2)]);
    }

    #[test]
    fn tombstones_dropped_only_in_oldest_segment() {
        let compactor = Compactor::new(CompactionConfig::drop_tombstones_in_oldest());
        let records = vec![set("a", "1", 1), Record::delete("a"), set("b", "2", 2)];

        let (output, stats) = compactor.compact(records.clone(), true);
        assert_eq!(output, vec![set("b", "2", 2)]);
        assert_eq!(stats.tombstones_removed, 1);

        let (output, stats) = compactor.compact(records, false);
        assert_eq!(output.len(), 2);
        assert_eq!(stats.tombstones_removed, 0);
    }

    #[test]
    fn unrecognized_operations_are_dropped() {
        let compactor = Compactor::with_defaults();
        let get = Record {
            operation: Operation::Unrecognized("get".to_string()),
            key: "a".to_string(),
            value: None,
        };

        let records = vec![set("a", "1", 1), get];
        let (output, stats) = compactor.compact(records, false);

        assert_eq!(output, vec![set("a", "1", 1)]);
        assert_eq!(stats.anomalies_dropped, 1);
    }

    #[test]
    fn empty_segment_stays_empty() {
        let (output, stats) = Compactor::with_defaults().compact(vec![], true);

        assert!(output.is_empty());
        assert_eq!(stats, CompactionResult::default());
    }

    #[test]
    fn output_is_sorted_by_key() {
        let compactor = Compactor::with_defaults();

        let records = vec![
            set("delta", "4", 1),
            set("alpha", "1", 2),
            Record::delete("charlie"),
            set("bravo", "2", 4),
        ];
        let (output, _) = compactor.compact(records, false);

        let keys: Vec<&str> = output.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn second_pass_changes_nothing() {
        let compactor = Compactor::with_defaults();
        let records = vec![
            set("b", "1", 1),
            set("a", "1", 2),
            Record::delete("b"),
            set("a", "2", 3),
        ];

        let (once, _) = compactor.compact(records, false);
        let (twice, stats) = compactor.compact(once.clone(), false);

        assert_eq!(once, twice);
        assert_eq!(stats.records_removed(), 0);
    }
}
