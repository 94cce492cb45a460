//! Log manager configuration.

use crate::segment::CompactionConfig;
use std::time::Duration;

/// Default period of the background compaction cycle.
pub const DEFAULT_COMPACTION_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for opening a log directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every append is fsynced before it is acknowledged.
    pub sync_on_write: bool,

    /// Period of the background compaction cycle (zero disables the timer;
    /// `compact_now` still works).
    pub compaction_interval: Duration,

    /// Whether a sealed segment that compacts to nothing is deleted.
    pub remove_empty_segments: bool,

    /// Compaction policy.
    pub compaction: CompactionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            compaction_interval: DEFAULT_COMPACTION_INTERVAL,
            remove_empty_segments: true,
            compaction: CompactionConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the compaction period.
    #[must_use]
    pub const fn compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = interval;
        self
    }

    /// Disables the background compaction timer.
    #[must_use]
    pub const fn without_background_compaction(self) -> Self {
        self.compaction_interval(Duration::ZERO)
    }

    /// Sets whether empty sealed segments are deleted.
    #[must_use]
    pub const fn remove_empty_segments(mut self, value: bool) -> Self {
        self.remove_empty_segments = value;
        self
    }

    /// Sets the compaction policy.
    #[must_use]
    pub fn compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    /// Returns true if the background compaction thread should run.
    #[must_use]
    pub fn background_compaction_enabled(&self) -> bool {
        !self.compaction_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert!(config.remove_empty_segments);
        assert_eq!(config.compaction_interval, Duration::from_secs(60));
        assert!(config.background_compaction_enabled());
        assert!(!config.compaction.drop_tombstones_in_oldest);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_write(false)
            .remove_empty_segments(false)
            .compaction(CompactionConfig::drop_tombstones_in_oldest())
            .without_background_compaction();

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_write);
        assert!(!config.remove_empty_segments);
        assert!(config.compaction.drop_tombstones_in_oldest);
        assert!(!config.background_compaction_enabled());
    }
}
