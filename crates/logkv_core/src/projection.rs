//! In-memory key-value projection of the log.
//!
//! The projection is what every read is served from. It is rebuilt at
//! startup by applying each segment's records in order and then kept current
//! by the log manager, which applies every record right after it has been
//! made durable. Nothing here touches disk.

use crate::error::{CoreError, CoreResult};
use crate::record::{Operation, Record, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// What happened when a record was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record changed the projection.
    Applied,
    /// A delete for a key that was not present. Harmless during replay.
    Absent,
    /// The record could not be applied. Processing should continue with the
    /// next record; the reason is for diagnostics.
    Anomaly(String),
}

impl ApplyOutcome {
    /// Returns true for [`ApplyOutcome::Anomaly`].
    #[must_use]
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::Anomaly(_))
    }
}

/// Key → latest applied value.
///
/// Internally synchronized: readers never observe a half-applied record and
/// never wait on log I/O.
#[derive(Debug, Default)]
pub struct KeyValueProjection {
    entries: RwLock<HashMap<String, Value>>,
}

impl KeyValueProjection {
    /// Creates an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn get(&self, key: &str) -> CoreResult<Value> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::key_not_found(key))
    }

    /// Stores `value` under `key`. Setting the same value twice is a no-op.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.write().insert(key.into(), value);
    }

    /// Removes `key`, returning the value it held.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn delete(&self, key: &str) -> CoreResult<Value> {
        self.entries
            .write()
            .remove(key)
            .ok_or_else(|| CoreError::key_not_found(key))
    }

    /// Applies one log record.
    pub fn apply(&self, record: &Record) -> ApplyOutcome {
        match &record.operation {
            Operation::Set => match &record.value {
                Some(value) => {
                    self.set(record.key.clone(), value.clone());
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Anomaly(format!(
                    "set record for key {:?} has no value",
                    record.key
                )),
            },
            Operation::Delete => match self.delete(&record.key) {
                Ok(_) => ApplyOutcome::Applied,
                Err(_) => ApplyOutcome::Absent,
            },
            Operation::Unrecognized(tag) => ApplyOutcome::Anomaly(format!(
                "unrecognized operation {tag:?} for key {:?}",
                record.key
            )),
        }
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns every key in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns an ordered copy of the whole mapping.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
