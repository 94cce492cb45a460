//! Property-based test generators using proptest.
//!
//! Provides strategies for operation sequences and a reference model that
//! computes the state a correct log must replay to.

use logkv_core::{Payload, Record, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// One client operation against the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// Store a payload under a key.
    Set(String, Payload),
    /// Remove a key.
    Delete(String),
}

impl LogOp {
    /// Returns the key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            Self::Set(key, _) | Self::Delete(key) => key,
        }
    }

    /// Converts the operation into a record with the given version.
    pub fn to_record(&self, version: u64) -> Record {
        match self {
            Self::Set(key, payload) => Record::set(key.clone(), Value::new(payload.clone(), version)),
            Self::Delete(key) => Record::delete(key.clone()),
        }
    }
}

/// Strategy for keys drawn from a small pool, so sequences overwrite.
pub fn key_strategy(pool: usize) -> impl Strategy<Value = String> {
    (0..pool.max(1)).prop_map(|i| format!("key{i}"))
}

/// Strategy for string or integer payloads.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop_oneof![
        any::<i64>().prop_map(Payload::Int),
        "[a-zA-Z0-9 \"\\\\{}:,]{0,24}".prop_map(Payload::Str),
    ]
}

/// Strategy for a single operation; sets are three times as likely.
pub fn op_strategy(key_pool: usize) -> impl Strategy<Value = LogOp> {
    prop_oneof![
        3 => (key_strategy(key_pool), payload_strategy()).prop_map(|(k, p)| LogOp::Set(k, p)),
        1 => key_strategy(key_pool).prop_map(LogOp::Delete),
    ]
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn ops_strategy(key_pool: usize, max_len: usize) -> impl Strategy<Value = Vec<LogOp>> {
    prop::collection::vec(op_strategy(key_pool), 0..max_len)
}

/// Reference model: the last `set` payload per key, with deletes applied.
pub fn expected_state(ops: &[LogOp]) -> BTreeMap<String, Payload> {
    let mut state = BTreeMap::new();
    for op in ops {
        match op {
            LogOp::Set(key, payload) => {
                state.insert(key.clone(), payload.clone());
            }
            LogOp::Delete(key) => {
                state.remove(key);
            }
        }
    }
    state
}

/// Reduces a projection snapshot to payloads for comparison with
/// [`expected_state`].
pub fn payloads(snapshot: BTreeMap<String, Value>) -> BTreeMap<String, Payload> {
    snapshot
        .into_iter()
        .map(|(key, value)| (key, value.payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_state_applies_in_order() {
        let ops = vec![
            LogOp::Set("a".into(), Payload::Int(1)),
            LogOp::Set("b".into(), Payload::Int(2)),
            LogOp::Delete("a".into()),
            LogOp::Set("b".into(), Payload::Str("x".into())),
        ];

        let state = expected_state(&ops);
        assert_eq!(state.len(), 1);
        assert_eq!(state["b"], Payload::Str("x".into()));
    }

    proptest! {
        #[test]
        fn keys_come_from_pool(op in op_strategy(3)) {
            prop_assert!(["key0", "key1", "key2"].contains(&op.key()));
        }

        #[test]
        fn records_are_valid(op in op_strategy(5), version in 0u64..1000) {
            prop_assert!(op.to_record(version).validate().is_ok());
        }
    }
}
