//! Segments: the append-only files that make up the log.
//!
//! A segment is a sequence of newline-delimited JSON records. The segment
//! with the highest id is *active* and takes appends; every other segment is
//! *sealed* and only changes when compaction rewrites it.
//!
//! ## Recovery Policy
//!
//! ### Tolerated (treated as a clean end of segment)
//!
//! - **Unterminated final fragment**: bytes after the last `\n`
//! - **Unparseable final line**: a crash mid-append may leave garbage
//!
//! Both are what an interrupted append looks like. They are discarded and,
//! during recovery, truncated away so later appends never follow garbage.
//!
//! ### Fatal
//!
//! - **Unparseable interior line**: any complete line before the last one
//!   that does not decode is `SegmentCorruption` and aborts startup.
//!
//! ## Invariants
//!
//! - Appends are durable (flush + fsync) before they are acknowledged
//! - A failed append leaves the file as it was, or poisons the segment
//! - `rewrite` goes through the backend's atomic `replace`
//! - Compaction keeps the last record per key, so replay is unchanged

mod compaction;
mod log;

pub use compaction::{CompactionConfig, CompactionResult, Compactor};
pub use log::{Segment, SegmentScan};
