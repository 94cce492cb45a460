//! # logkv Testkit
//!
//! Test utilities for logkv.
//!
//! This crate provides:
//! - Temporary log fixtures that can be stopped and reopened
//! - Property-based generators for operation sequences, plus a reference
//!   model to check replay against
//! - Crash simulation: a storage backend that tears or fails writes, and
//!   helpers that damage segment files on disk
//! - Stress helpers for concurrent writers racing compaction
//!
//! ## Usage
//!
//! ```rust
//! use logkv_testkit::prelude::*;
//!
//! let mut log = TestLog::new();
//! log.set("a", "1").unwrap();
//! log.reopen();
//! assert_eq!(log.get("a").unwrap().as_str(), Some("1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
