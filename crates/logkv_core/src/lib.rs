//! # logkv core
//!
//! A durable key-value store built on a segmented append-only log.
//!
//! This crate provides:
//! - The record model and its newline-delimited JSON line format
//! - Segments: append, replay with torn-tail recovery, atomic rewrite
//! - Last-write-wins compaction of sealed segments
//! - The in-memory key-value projection every read is served from
//! - [`LogManager`], which ties them together and runs background compaction
//!
//! ## Example
//!
//! ```rust,no_run
//! use logkv_core::{Config, LogManager};
//!
//! let manager = LogManager::open("/tmp/logkv", Config::default())?;
//! manager.set("a", "1")?;
//! manager.set("a", "2")?;
//! assert_eq!(manager.get("a")?.as_str(), Some("2"));
//!
//! manager.compact_now()?;
//! manager.stop()?;
//! # Ok::<(), logkv_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod manager;
mod projection;
mod record;
mod segment;
mod stats;
mod types;

pub use config::{Config, DEFAULT_COMPACTION_INTERVAL};
pub use dir::LogDir;
pub use error::{CoreError, CoreResult};
pub use manager::{CompactionOutcome, LogManager, SegmentInfo};
pub use projection::{ApplyOutcome, KeyValueProjection};
pub use record::{Operation, Payload, Record, Value, RECORD_DELIMITER};
pub use segment::{CompactionConfig, CompactionResult, Compactor, Segment, SegmentScan};
pub use stats::{ManagerStats, StatsSnapshot};
pub use types::{SegmentId, SEGMENT_PREFIX};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
