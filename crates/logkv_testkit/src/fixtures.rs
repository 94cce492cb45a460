//! Test fixtures and log helpers.
//!
//! Provides a temporary log directory with a running manager that can be
//! stopped and reopened to exercise recovery.

use logkv_core::{Config, LogManager, SegmentId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Configuration used by fixtures: no background timer, so tests decide
/// when compaction runs.
pub fn test_config() -> Config {
    Config::default().without_background_compaction()
}

/// A log in a temporary directory with automatic cleanup.
pub struct TestLog {
    manager: Option<LogManager>,
    config: Config,
    temp_dir: TempDir,
}

impl TestLog {
    /// Creates a fresh log with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a fresh log with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manager =
            LogManager::open(temp_dir.path(), config.clone()).expect("Failed to open log");
        Self {
            manager: Some(manager),
            config,
            temp_dir,
        }
    }

    /// Returns the log directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the path of a segment file.
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.path().join(id.file_name())
    }

    /// Returns the running manager.
    pub fn manager(&self) -> &LogManager {
        self.manager.as_ref().expect("Log is closed")
    }

    /// Stops the manager, leaving the files in place.
    pub fn close(&mut self) {
        if let Some(manager) = self.manager.take() {
            manager.stop().expect("Failed to stop log");
        }
    }

    /// Stops the manager and starts a new one on the same directory.
    pub fn reopen(&mut self) {
        self.close();
        self.manager = Some(
            LogManager::open(self.temp_dir.path(), self.config.clone())
                .expect("Failed to reopen log"),
        );
    }

    /// Stops the manager, runs `f` against the files, then reopens.
    ///
    /// Used to damage segment files between runs.
    pub fn while_closed<F>(&mut self, f: F)
    where
        F: FnOnce(&Path),
    {
        self.close();
        f(self.temp_dir.path());
        self.reopen();
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestLog {
    type Target = LogManager;

    fn deref(&self) -> &Self::Target {
        self.manager()
    }
}

/// Runs a test with a temporary log.
///
/// # Example
///
/// ```rust
/// use logkv_testkit::with_temp_log;
///
/// with_temp_log(|log| {
///     log.set("a", "1").unwrap();
///     assert_eq!(log.len(), 1);
/// });
/// ```
pub fn with_temp_log<F, R>(f: F) -> R
where
    F: FnOnce(&LogManager) -> R,
{
    let log = TestLog::new();
    f(log.manager())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a log where `keys` keys have each been written `rounds`
    /// times, all in segment 1.
    pub fn overwritten_log(keys: usize, rounds: usize) -> TestLog {
        let log = TestLog::new();
        for round in 0..rounds {
            for key in 0..keys {
                log.set(format!("key{key}"), round as i64)
                    .expect("Failed to set key");
            }
        }
        log
    }

    /// Creates a log with one compacted sealed segment and some writes in
    /// the active one.
    pub fn rotated_log() -> TestLog {
        let log = overwritten_log(5, 4);
        log.delete("key0").expect("Failed to delete key");
        log.compact_now().expect("Failed to compact");
        log.set("key1", "after").expect("Failed to set key");
        log.set("fresh", "new").expect("Failed to set key");
        log
    }
}
