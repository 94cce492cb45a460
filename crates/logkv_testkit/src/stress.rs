//! Concurrent write load against a live manager.
//!
//! These helpers drive a manager with concurrent writers while compaction
//! cycles run, to check that rotation never loses or reorders writes.

use logkv_core::{CompactionOutcome, LogManager};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What a [`stress_writes_during_compaction`] run observed.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Writes attempted across all threads.
    pub total_ops: usize,
    /// Writes the manager accepted.
    pub successful_ops: usize,
    /// Writes that returned an error.
    pub failed_ops: usize,
    /// Compaction cycles that completed while the writers ran.
    pub compactions: usize,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl StressTestResult {
    /// Writes per second over the whole run, or zero for an instant run.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints the counters to stdout under `label`.
    pub fn print_summary(&self, label: &str) {
        println!(
            "{label}: {}/{} writes ok, {} compactions, {:?} ({:.0} writes/s)",
            self.successful_ops,
            self.total_ops,
            self.compactions,
            self.duration,
            self.throughput()
        );
    }
}

/// Shape of a stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Writes issued by each thread.
    pub operations: usize,
    /// Writer threads.
    pub threads: usize,
    /// Distinct keys each thread cycles through.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            key_count: 16,
        }
    }
}

/// Key written by thread `thread` for slot `slot`.
pub fn stress_key(thread: usize, slot: usize) -> String {
    format!("t{thread}-k{slot}")
}

/// Runs concurrent writers while another thread compacts in a loop.
///
/// Writer `t` sets `stress_key(t, i % key_count)` to `i`, so after the run
/// each key holds the last `i` that mapped to it.
pub fn stress_writes_during_compaction(
    manager: Arc<LogManager>,
    config: &StressConfig,
) -> StressTestResult {
    let accepted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let started = Instant::now();

    let compactor = {
        let manager = Arc::clone(&manager);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut completed = 0usize;
            while !done.load(Ordering::SeqCst) {
                if let Ok(CompactionOutcome::Completed { .. }) = manager.compact_now() {
                    completed += 1;
                }
                thread::yield_now();
            }
            completed
        })
    };

    let writers: Vec<_> = (0..config.threads)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let accepted = Arc::clone(&accepted);
            let rejected = Arc::clone(&rejected);
            let operations = config.operations;
            let key_count = config.key_count.max(1);

            thread::spawn(move || {
                for i in 0..operations {
                    let counter = match manager.set(stress_key(t, i % key_count), i as i64) {
                        Ok(()) => &accepted,
                        Err(_) => &rejected,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().expect("writer thread panicked");
    }
    done.store(true, Ordering::SeqCst);
    let compactions = compactor.join().expect("compaction thread panicked");

    let successful_ops = accepted.load(Ordering::Relaxed);
    let failed_ops = rejected.load(Ordering::Relaxed);
    StressTestResult {
        total_ops: successful_ops + failed_ops,
        successful_ops,
        failed_ops,
        compactions,
        duration: started.elapsed(),
    }
}

/// Returns the value each stress key must hold after
/// [`stress_writes_during_compaction`] with `config`.
pub fn expected_stress_value(config: &StressConfig, slot: usize) -> Option<i64> {
    let key_count = config.key_count.max(1);
    (0..config.operations)
        .rev()
        .find(|i| i % key_count == slot)
        .map(|i| i as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_config;

    #[test]
    fn test_writes_during_compaction() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(LogManager::open(dir.path(), test_config()).unwrap());
        let config = StressConfig {
            operations: 200,
            threads: 3,
            key_count: 8,
        };

        let result = stress_writes_during_compaction(Arc::clone(&manager), &config);

        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 600);
        for t in 0..config.threads {
            for slot in 0..config.key_count {
                let value = manager.get(&stress_key(t, slot)).unwrap();
                assert_eq!(value.as_int(), expected_stress_value(&config, slot));
            }
        }
    }
}
