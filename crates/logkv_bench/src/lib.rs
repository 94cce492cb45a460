//! Benchmark utilities for logkv.

#![warn(missing_docs)]

use logkv_core::{Record, Value};
use rand::Rng;

/// Generate a random alphanumeric string of the given length.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

/// Generate `count` set records spread over `keys` distinct keys, with a
/// `delete` every `delete_every` records (0 disables deletes).
pub fn generate_records(count: usize, keys: usize, payload_len: usize, delete_every: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let keys = keys.max(1);

    (0..count)
        .map(|i| {
            let key = format!("key{}", rng.gen_range(0..keys));
            if delete_every > 0 && i % delete_every == delete_every - 1 {
                Record::delete(key)
            } else {
                Record::set(key, Value::string(random_string(payload_len), i as u64 + 1))
            }
        })
        .collect()
}

/// Encode records into segment bytes.
pub fn encode_segment(records: &[Record]) -> Vec<u8> {
    let mut data = Vec::new();
    for record in records {
        data.extend_from_slice(&record.encode_line().expect("record encodes"));
    }
    data
}
