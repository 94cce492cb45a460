//! End-to-end recovery tests against real log directories.

use logkv_core::{CompactionOutcome, Config, CoreError, LogManager, SegmentId};
use logkv_testkit::prelude::*;
use std::fs;
use std::sync::Arc;

#[test]
fn overwrite_then_get_returns_latest() {
    let log = TestLog::new();
    log.set("a", "1").unwrap();
    log.set("a", "2").unwrap();
    assert_eq!(log.get("a").unwrap().as_str(), Some("2"));
}

#[test]
fn delete_then_get_is_not_found() {
    let mut log = TestLog::new();
    log.set("b", "1").unwrap();
    log.delete("b").unwrap();
    assert!(matches!(log.get("b"), Err(CoreError::KeyNotFound { .. })));

    log.reopen();
    assert!(matches!(log.get("b"), Err(CoreError::KeyNotFound { .. })));
}

#[test]
fn partial_trailing_record_is_dropped() {
    let mut log = TestLog::new();
    log.set("c", "complete").unwrap();

    log.while_closed(|dir| {
        append_partial_record(&dir.join(SegmentId::FIRST.file_name())).unwrap();
    });

    assert_eq!(log.get("c").unwrap().as_str(), Some("complete"));
    assert!(log.get("torn").is_err());
    assert_eq!(log.stats().torn_tails_discarded, 1);
}

#[test]
fn torn_final_write_keeps_earlier_records() {
    let mut log = TestLog::new();
    for i in 0..10i64 {
        log.set(format!("k{i}"), i).unwrap();
    }

    log.while_closed(|dir| {
        tear_tail(&dir.join(SegmentId::FIRST.file_name()), 7).unwrap();
    });

    assert_eq!(log.len(), 9);
    assert_eq!(log.get("k8").unwrap().as_int(), Some(8));
    assert!(log.get("k9").is_err());

    // New appends land after the repaired prefix.
    log.set("k9", 99i64).unwrap();
    log.reopen();
    assert_eq!(log.get("k9").unwrap().as_int(), Some(99));
}

#[test]
fn interior_garbage_refuses_to_start() {
    let mut log = TestLog::new();
    log.set("a", "1").unwrap();
    log.close();

    insert_garbage_line(&log.segment_path(SegmentId::FIRST)).unwrap();

    let result = LogManager::open(log.path(), test_config());
    match result {
        Err(CoreError::SegmentCorruption { segment, line, .. }) => {
            assert_eq!(segment, SegmentId::FIRST);
            assert_eq!(line, 1);
        }
        other => panic!("expected corruption, got {other:?}"),
    }
}

#[test]
fn thousand_writes_compact_to_last_per_key() {
    let log = TestLog::new();
    let mut ops = Vec::new();
    for i in 0..1000usize {
        let key = format!("key{}", i % 10);
        if i % 9 == 0 {
            ops.push(LogOp::Delete(key));
        } else {
            ops.push(LogOp::Set(key, logkv_core::Payload::Int(i as i64)));
        }
    }
    for (i, op) in ops.iter().enumerate() {
        log.write_record(op.to_record(i as u64 + 1)).unwrap();
    }

    let CompactionOutcome::Completed { result, .. } = log.compact_now().unwrap() else {
        panic!("expected a completed cycle");
    };
    assert_eq!(result.input_records, 1000);
    assert!(result.output_records <= 10);

    let content = fs::read_to_string(log.segment_path(SegmentId::FIRST)).unwrap();
    assert!(content.lines().count() <= 10);
    assert_eq!(payloads(log.projection().snapshot()), expected_state(&ops));
}

#[test]
fn compaction_with_concurrent_writes_survives_restart() {
    let mut log = scenarios::rotated_log();
    let before = log.projection().snapshot();

    log.reopen();
    assert_eq!(log.projection().snapshot(), before);
    assert_eq!(
        log.segment_ids(),
        vec![SegmentId::new(1), SegmentId::new(2)]
    );
}

#[test]
fn segment_ids_never_repeat() {
    let mut log = TestLog::new();
    let mut actives = vec![log.active_segment_id().unwrap()];

    for round in 0..4i64 {
        log.set("k", round).unwrap();
        log.compact_now().unwrap();
        actives.push(log.active_segment_id().unwrap());
        log.reopen();
        assert_eq!(log.active_segment_id(), actives.last().copied());
    }

    assert!(actives.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn empty_rotations_do_not_accumulate_segments() {
    let log = TestLog::new();
    log.set("a", "1").unwrap();

    for _ in 0..5 {
        log.compact_now().unwrap();
    }
    // Segment 1 holds "a"; the empty segments sealed after it are removed.
    assert_eq!(log.segment_ids(), vec![SegmentId::new(1), SegmentId::new(6)]);
}

#[test]
fn stale_rewrite_staging_file_is_ignored() {
    let mut log = TestLog::new();
    log.set("a", "1").unwrap();

    log.while_closed(|dir| {
        fs::write(dir.join("segment-000001.tmp"), b"{\"operation\":\"delete\"").unwrap();
    });

    assert_eq!(log.get("a").unwrap().as_str(), Some("1"));
    assert!(!log.path().join("segment-000001.tmp").exists());
}

#[test]
fn background_compaction_runs_until_stopped() {
    let config = Config::default().compaction_interval(std::time::Duration::from_millis(10));
    let mut log = TestLog::with_config(config);
    log.set("a", "1").unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while log.stats().compactions_completed == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert!(log.stats().compactions_completed > 0);

    log.close();
    log.reopen();
    assert_eq!(log.get("a").unwrap().as_str(), Some("1"));
}

#[test]
fn concurrent_writers_and_compaction() {
    let dir = tempfile::tempdir().unwrap();
    let config = StressConfig {
        operations: 300,
        threads: 4,
        key_count: 10,
    };

    let expected = {
        let manager = Arc::new(LogManager::open(dir.path(), test_config()).unwrap());
        let result = stress_writes_during_compaction(Arc::clone(&manager), &config);
        result.print_summary("concurrent_writers_and_compaction");
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops, config.operations * config.threads);
        let snapshot = manager.projection().snapshot();
        manager.stop().unwrap();
        snapshot
    };

    let manager = LogManager::open(dir.path(), test_config()).unwrap();
    assert_eq!(manager.projection().snapshot(), expected);
    for t in 0..config.threads {
        for slot in 0..config.key_count {
            assert_eq!(
                manager.get(&stress_key(t, slot)).unwrap().as_int(),
                expected_stress_value(&config, slot)
            );
        }
    }
}
