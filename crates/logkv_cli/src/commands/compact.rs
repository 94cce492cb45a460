//! Compact command implementation.

use super::scan_segments;
use logkv_core::{CompactionOutcome, CompactionResult, Compactor, Config, LogManager};
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting log at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    if dry_run {
        let result = preview(path)?;
        print_result(&result);
        return Ok(());
    }

    let manager = LogManager::open(path, Config::default().without_background_compaction())?;
    let outcome = manager.compact_now()?;
    manager.stop()?;

    match outcome {
        CompactionOutcome::Skipped => println!("Another compaction was running; nothing done."),
        CompactionOutcome::Completed {
            sealed,
            active,
            segment_removed,
            result,
        } => {
            println!("Sealed {} and opened {}", sealed.file_name(), active.file_name());
            print_result(&result);
            if segment_removed {
                println!("  {} was empty and has been removed", sealed.file_name());
            }
            println!();
            println!("✓ Compaction complete");
        }
    }

    Ok(())
}

/// Computes what compacting the active segment would do, without writing.
pub fn preview(path: &Path) -> Result<CompactionResult, Box<dyn std::error::Error>> {
    let reports = scan_segments(path)?;
    let Some(active) = reports.last() else {
        return Ok(CompactionResult::default());
    };
    let is_oldest = reports.len() == 1;

    let records = match &active.scan {
        Ok(scan) => scan.records.clone(),
        Err(err) => return Err(err.to_string().into()),
    };

    let compactor = Compactor::new(Config::default().compaction);
    let (_, result) = compactor.compact(records, is_oldest);
    Ok(result)
}

fn print_result(result: &CompactionResult) {
    println!("  Input records:     {}", result.input_records);
    println!("  Output records:    {}", result.output_records);
    println!("  Obsolete removed:  {}", result.obsolete_records_removed);
    println!("  Tombstones removed: {}", result.tombstones_removed);
    println!("  Anomalies dropped: {}", result.anomalies_dropped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use logkv_core::SegmentId;
    use std::fs;
    use tempfile::tempdir;

    fn write_log(path: &Path) {
        let manager =
            LogManager::open(path, Config::default().without_background_compaction()).unwrap();
        for i in 0..20i64 {
            manager.set(format!("k{}", i % 4), i).unwrap();
        }
    }

    #[test]
    fn dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        write_log(dir.path());
        let before = fs::read(dir.path().join(SegmentId::FIRST.file_name())).unwrap();

        let result = preview(dir.path()).unwrap();
        assert_eq!(result.input_records, 20);
        assert_eq!(result.output_records, 4);

        run(dir.path(), true).unwrap();
        let after = fs::read(dir.path().join(SegmentId::FIRST.file_name())).unwrap();
        assert_eq!(before, after);
        assert!(!dir.path().join("segment-000002").exists());
    }

    #[test]
    fn compact_rewrites_active_segment() {
        let dir = tempdir().unwrap();
        write_log(dir.path());

        run(dir.path(), false).unwrap();

        let content = fs::read_to_string(dir.path().join("segment-000001")).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(dir.path().join("segment-000002").exists());
    }
}
