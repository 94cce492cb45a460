//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod inspect;
pub mod kv;
pub mod verify;

use logkv_core::{CoreError, CoreResult, LogDir, Segment, SegmentId, SegmentScan};
use logkv_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// What a read-only pass over one segment file found.
#[derive(Debug)]
pub struct SegmentReport {
    /// Segment id.
    pub id: SegmentId,
    /// File size in bytes.
    pub size: u64,
    /// Records and torn-tail information, or the corruption that stopped
    /// the scan.
    pub scan: Result<SegmentScan, CoreError>,
}

impl SegmentReport {
    /// Number of well-formed records, zero if the scan failed.
    pub fn record_count(&self) -> usize {
        self.scan.as_ref().map_or(0, |scan| scan.records.len())
    }
}

/// Scans every segment in `path` without modifying anything.
///
/// Holds the directory lock for the duration, so this fails while another
/// process has the log open. Torn tails are reported, not truncated.
pub fn scan_segments(path: &Path) -> CoreResult<Vec<SegmentReport>> {
    let dir = LogDir::open(path, false)?;
    let mut reports = Vec::new();

    for id in dir.list_segments()? {
        let backend = FileBackend::open(&dir.segment_path(id))?;
        let size = backend.size()?;
        let segment = Segment::new(id, Box::new(backend), false);

        reports.push(SegmentReport {
            id,
            size,
            scan: segment.scan(),
        });
    }

    Ok(reports)
}
