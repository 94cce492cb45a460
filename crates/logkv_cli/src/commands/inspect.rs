//! Inspect command implementation.

use super::{scan_segments, SegmentReport};
use serde::Serialize;
use std::path::Path;

/// Log directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Directory path.
    pub path: String,
    /// Number of segment files.
    pub segment_count: usize,
    /// Total size of all segments in bytes.
    pub total_size: u64,
    /// Total number of well-formed records.
    pub record_count: usize,
    /// Per-segment details, ascending by id.
    pub segments: Vec<SegmentSummary>,
}

/// Details for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    /// Segment id.
    pub id: u64,
    /// File name.
    pub file: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of well-formed records.
    pub records: usize,
    /// Number of `set` records.
    pub sets: usize,
    /// Number of `delete` records.
    pub deletes: usize,
    /// Bytes of torn trailing record, if any.
    pub torn_tail_bytes: u64,
    /// Whether this is the highest id, which receives appends.
    pub active: bool,
    /// Corruption that stopped the scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SegmentSummary {
    fn from_report(report: &SegmentReport, active: bool) -> Self {
        let mut summary = Self {
            id: report.id.as_u64(),
            file: report.id.file_name(),
            size: report.size,
            records: 0,
            sets: 0,
            deletes: 0,
            torn_tail_bytes: 0,
            active,
            error: None,
        };

        match &report.scan {
            Ok(scan) => {
                summary.records = scan.records.len();
                summary.sets = scan.records.iter().filter(|r| r.is_set()).count();
                summary.deletes = scan.records.iter().filter(|r| r.is_delete()).count();
                summary.torn_tail_bytes = scan.discarded_bytes;
            }
            Err(err) => summary.error = Some(err.to_string()),
        }
        summary
    }
}

/// Builds the inspection result for `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let reports = scan_segments(path)?;
    let active = reports.last().map(|r| r.id);

    let segments: Vec<SegmentSummary> = reports
        .iter()
        .map(|report| SegmentSummary::from_report(report, Some(report.id) == active))
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        segment_count: segments.len(),
        total_size: segments.iter().map(|s| s.size).sum(),
        record_count: segments.iter().map(|s| s.records).sum(),
        segments,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("logkv Log Directory");
    println!("===================");
    println!("Path: {}", result.path);
    println!();
    println!("Segments:   {}", result.segment_count);
    println!("Total size: {} bytes", result.total_size);
    println!("Records:    {}", result.record_count);
    println!();

    for segment in &result.segments {
        let marker = if segment.active { " (active)" } else { "" };
        println!("  {}{}", segment.file, marker);
        println!(
            "    {} bytes, {} records ({} set, {} delete)",
            segment.size, segment.records, segment.sets, segment.deletes
        );
        if segment.torn_tail_bytes > 0 {
            println!("    torn tail: {} bytes", segment.torn_tail_bytes);
        }
        if let Some(error) = &segment.error {
            println!("    ERROR: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logkv_core::{Config, LogManager};
    use tempfile::tempdir;

    #[test]
    fn inspect_counts_records_per_segment() {
        let dir = tempdir().unwrap();
        {
            let manager =
                LogManager::open(dir.path(), Config::default().without_background_compaction())
                    .unwrap();
            manager.set("a", "1").unwrap();
            manager.set("b", "2").unwrap();
            manager.delete("a").unwrap();
            manager.compact_now().unwrap();
            manager.set("c", "3").unwrap();
        }

        let result = inspect(dir.path()).unwrap();
        assert_eq!(result.segment_count, 2);
        assert_eq!(result.segments[0].records, 2);
        assert_eq!(result.segments[0].deletes, 1);
        assert!(!result.segments[0].active);
        assert_eq!(result.segments[1].records, 1);
        assert!(result.segments[1].active);
        assert_eq!(result.record_count, 3);
    }
}
