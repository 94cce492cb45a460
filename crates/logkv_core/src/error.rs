//! Error types for logkv core.

use crate::types::SegmentId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in logkv core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] logkv_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A complete line in the interior of a segment failed to parse.
    #[error("segment {segment} corrupted at line {line}: {message}")]
    SegmentCorruption {
        /// The corrupted segment.
        segment: SegmentId,
        /// One-based line number of the bad record.
        line: usize,
        /// Description of the corruption.
        message: String,
    },

    /// A record failed validation before it was written.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Why the record was rejected.
        message: String,
    },

    /// A file name in the log directory does not encode a segment id.
    #[error("invalid segment file name: {name}")]
    InvalidSegmentName {
        /// The offending file name.
        name: String,
    },

    /// Key not found.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// An append failed and the segment could not be rolled back.
    #[error("segment {segment} is poisoned by a failed append and refuses writes")]
    SegmentPoisoned {
        /// The poisoned segment.
        segment: SegmentId,
    },

    /// Another process holds the log directory.
    #[error("log directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// The manager has been stopped.
    #[error("log manager is closed")]
    ManagerClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn segment_corruption(segment: SegmentId, line: usize, message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            segment,
            line,
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors that mean the on-disk log cannot be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::SegmentCorruption { .. })
    }
}
