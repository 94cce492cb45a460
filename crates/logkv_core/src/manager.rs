//! The log manager.
//!
//! `LogManager` owns a log directory: the set of segments, the active
//! segment that receives appends, the key-value projection rebuilt from
//! them, and the background thread that periodically compacts the log.
//!
//! ## Lock order
//!
//! 1. `cycle_lock` (one compaction cycle at a time)
//! 2. `segments` (shared for appends, exclusive for rotation)
//! 3. a segment's mutex
//! 4. the projection's internal lock
//!
//! A thread never acquires a lock that comes earlier in this list while
//! holding a later one.

use crate::config::Config;
use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::projection::{ApplyOutcome, KeyValueProjection};
use crate::record::{Payload, Record, Value};
use crate::segment::{CompactionResult, Compactor, Segment};
use crate::stats::{ManagerStats, StatsSnapshot};
use crate::types::SegmentId;
use parking_lot::{Condvar, Mutex, RwLock};
use logkv_storage::{FileBackend, StorageBackend};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const COMPACTION_THREAD_NAME: &str = "logkv-compaction";

/// What a compaction cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Another cycle was already running; nothing was done.
    Skipped,
    /// The active segment was sealed and compacted.
    Completed {
        /// The segment that was sealed and compacted.
        sealed: SegmentId,
        /// The new active segment.
        active: SegmentId,
        /// Whether the sealed segment compacted to nothing and was deleted.
        segment_removed: bool,
        /// Record counts for the sealed segment.
        result: CompactionResult,
    },
}

/// Size and role of one segment, as reported by [`LogManager::segment_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment id.
    pub id: SegmentId,
    /// Current file size in bytes.
    pub size: u64,
    /// Whether this segment receives appends.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Open segments plus the directory they live in.
///
/// Dropping the set releases the directory lock.
struct SegmentSet {
    dir: LogDir,
    segments: BTreeMap<SegmentId, Arc<Mutex<Segment>>>,
    active: SegmentId,
    /// Sealed segments whose compaction failed; retried first next cycle.
    pending: BTreeSet<SegmentId>,
}

impl SegmentSet {
    fn get(&self, id: SegmentId) -> CoreResult<Arc<Mutex<Segment>>> {
        self.segments
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::invalid_operation(format!("segment {id} is not open")))
    }

    fn active_segment(&self) -> CoreResult<Arc<Mutex<Segment>>> {
        self.get(self.active)
    }

    fn is_oldest(&self, id: SegmentId) -> bool {
        self.segments.keys().next() == Some(&id)
    }
}

/// Wraps each segment's file before the segment takes ownership of it.
pub(crate) type BackendWrapper = Box<dyn Fn(FileBackend) -> Box<dyn StorageBackend> + Send + Sync>;

/// A sealed segment handed from rotation to compaction.
struct Rotation {
    sealed: SegmentId,
    active: SegmentId,
    segment: Arc<Mutex<Segment>>,
}

/// State shared with the compaction thread.
struct Shared {
    path: PathBuf,
    config: Config,
    compactor: Compactor,
    segments: RwLock<Option<SegmentSet>>,
    projection: KeyValueProjection,
    stats: ManagerStats,
    next_version: AtomicU64,
    cycle_lock: Mutex<()>,
    compacting: AtomicBool,
    stop_requested: Mutex<bool>,
    stop_signal: Condvar,
    wrap_backend: Option<BackendWrapper>,
}

/// Clears the compaction flag when a cycle ends, however it ends.
struct CompactingGuard<'a>(&'a AtomicBool);

impl<'a> CompactingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for CompactingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    fn open_segment(&self, dir: &LogDir, id: SegmentId) -> CoreResult<Segment> {
        let file = dir.open_segment_backend(id)?;
        let backend: Box<dyn StorageBackend> = match &self.wrap_backend {
            Some(wrap) => wrap(file),
            None => Box::new(file),
        };
        Ok(Segment::new(id, backend, self.config.sync_on_write))
    }

    fn recover(&self) -> CoreResult<SegmentSet> {
        let dir = LogDir::open(&self.path, self.config.create_if_missing)?;
        dir.remove_stale_temp_files()?;

        let ids = dir.list_segments()?;
        let mut segments = BTreeMap::new();
        self.projection.clear();

        if ids.is_empty() {
            let id = SegmentId::FIRST;
            let segment = self.open_segment(&dir, id)?;
            dir.sync()?;
            segments.insert(id, Arc::new(Mutex::new(segment)));
            self.next_version.store(1, Ordering::SeqCst);
            info!(path = %self.path.display(), "created new log");
            return Ok(SegmentSet {
                dir,
                segments,
                active: id,
                pending: BTreeSet::new(),
            });
        }

        let mut max_version = 0u64;
        let mut replayed = 0usize;

        for id in ids {
            let mut segment = self.open_segment(&dir, id)?;

            let scan = segment.recover()?;
            if scan.has_torn_tail() {
                self.stats.record_torn_tail();
            }

            for record in &scan.records {
                if let Some(version) = record.version() {
                    max_version = max_version.max(version);
                }
                if let ApplyOutcome::Anomaly(reason) = self.projection.apply(record) {
                    self.stats.record_anomaly();
                    warn!(segment = %id, %reason, "skipping record during replay");
                }
            }

            debug!(segment = %id, records = scan.records.len(), "replayed segment");
            replayed += scan.records.len();
            self.stats.record_replayed(scan.records.len() as u64);
            segments.insert(id, Arc::new(Mutex::new(segment)));
        }

        let active = segments
            .keys()
            .next_back()
            .copied()
            .unwrap_or(SegmentId::FIRST);
        self.next_version
            .store(max_version.saturating_add(1), Ordering::SeqCst);

        info!(
            path = %self.path.display(),
            segments = segments.len(),
            records = replayed,
            keys = self.projection.len(),
            active = %active,
            "recovered log"
        );

        Ok(SegmentSet {
            dir,
            segments,
            active,
            pending: BTreeSet::new(),
        })
    }

    fn write_record(&self, record: &Record) -> CoreResult<()> {
        record.validate()?;

        let guard = self.segments.read();
        let set = guard.as_ref().ok_or(CoreError::ManagerClosed)?;
        let segment = set.active_segment()?;
        let mut segment = segment.lock();

        let offset = segment.append(record)?;
        let end = segment.size().unwrap_or(offset);
        self.stats.record_write(end.saturating_sub(offset));

        if let Some(version) = record.version() {
            self.next_version
                .fetch_max(version.saturating_add(1), Ordering::SeqCst);
        }

        // Applied while the segment is still locked so the projection sees
        // records in file order.
        if let ApplyOutcome::Anomaly(reason) = self.projection.apply(record) {
            self.stats.record_anomaly();
            warn!(segment = %segment.id(), %reason, "logged record could not be applied");
        }
        Ok(())
    }

    fn rotate(&self) -> CoreResult<Rotation> {
        let mut guard = self.segments.write();
        let set = guard.as_mut().ok_or(CoreError::ManagerClosed)?;

        let sealed = set.active;
        let active = sealed.next().ok_or_else(|| {
            CoreError::invalid_operation(format!("no segment id left after {sealed}"))
        })?;
        let segment = set.get(sealed)?;

        let next = self.open_segment(&set.dir, active)?;
        set.dir.sync()?;
        set.segments.insert(active, Arc::new(Mutex::new(next)));
        set.active = active;

        debug!(sealed = %sealed, active = %active, "rotated active segment");

        Ok(Rotation {
            sealed,
            active,
            segment,
        })
    }

    fn remove_segment(&self, id: SegmentId) -> CoreResult<()> {
        let mut guard = self.segments.write();
        let set = guard.as_mut().ok_or(CoreError::ManagerClosed)?;
        set.dir.remove_segment(id)?;
        set.segments.remove(&id);
        set.pending.remove(&id);
        self.stats.record_segment_removed();
        Ok(())
    }

    /// Sealed segments still waiting for a successful compaction, with the
    /// handle and whether each is currently the oldest segment.
    fn pending_segments(&self) -> CoreResult<Vec<(SegmentId, Arc<Mutex<Segment>>, bool)>> {
        let guard = self.segments.read();
        let set = guard.as_ref().ok_or(CoreError::ManagerClosed)?;
        set.pending
            .iter()
            .map(|&id| Ok((id, set.get(id)?, set.is_oldest(id))))
            .collect()
    }

    fn set_pending(&self, id: SegmentId, failed: bool) {
        if let Some(set) = self.segments.write().as_mut() {
            if failed {
                set.pending.insert(id);
            } else {
                set.pending.remove(&id);
            }
        }
    }

    fn is_oldest(&self, id: SegmentId) -> CoreResult<bool> {
        let guard = self.segments.read();
        let set = guard.as_ref().ok_or(CoreError::ManagerClosed)?;
        Ok(set.is_oldest(id))
    }

    /// Reduces one sealed segment. Returns the counts and whether the
    /// segment was deleted. On error the segment keeps its content.
    fn compact_sealed(
        &self,
        id: SegmentId,
        segment: &Mutex<Segment>,
        is_oldest: bool,
    ) -> CoreResult<(CompactionResult, bool)> {
        let mut segment = segment.lock();
        segment.sync()?;
        let records = segment.replay()?;
        let (output, result) = self.compactor.compact(records, is_oldest);

        let removed = output.is_empty() && self.config.remove_empty_segments;
        if removed {
            drop(segment);
            self.remove_segment(id)?;
        } else {
            segment.rewrite(&output)?;
        }
        self.stats.record_compaction(result.records_removed() as u64);
        Ok((result, removed))
    }

    fn compact_cycle(&self) -> CoreResult<CompactionOutcome> {
        let Some(_cycle) = self.cycle_lock.try_lock() else {
            self.stats.record_compaction_skipped();
            debug!("compaction already running; skipping cycle");
            return Ok(CompactionOutcome::Skipped);
        };
        let _compacting = CompactingGuard::set(&self.compacting);

        match self.run_compaction() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.stats.record_compaction_failed();
                Err(err)
            }
        }
    }

    fn run_compaction(&self) -> CoreResult<CompactionOutcome> {
        // Earlier failures first; while one keeps failing, no new segment
        // is sealed.
        for (id, segment, is_oldest) in self.pending_segments()? {
            let (result, removed) = self.compact_sealed(id, &segment, is_oldest)?;
            self.set_pending(id, false);
            info!(
                sealed = %id,
                input = result.input_records,
                output = result.output_records,
                removed,
                "retried compaction completed"
            );
        }

        let rotation = self.rotate()?;
        let is_oldest = self.is_oldest(rotation.sealed)?;
        let (result, segment_removed) =
            match self.compact_sealed(rotation.sealed, &rotation.segment, is_oldest) {
                Ok(done) => done,
                Err(err) => {
                    self.set_pending(rotation.sealed, true);
                    return Err(err);
                }
            };

        info!(
            sealed = %rotation.sealed,
            active = %rotation.active,
            input = result.input_records,
            output = result.output_records,
            removed = segment_removed,
            "compaction completed"
        );

        Ok(CompactionOutcome::Completed {
            sealed: rotation.sealed,
            active: rotation.active,
            segment_removed,
            result,
        })
    }

    /// Body of the compaction thread.
    fn run_timer(&self, interval: Duration) {
        loop {
            {
                let deadline = Instant::now() + interval;
                let mut stop = self.stop_requested.lock();
                while !*stop {
                    if self.stop_signal.wait_until(&mut stop, deadline).timed_out() {
                        break;
                    }
                }
                if *stop {
                    break;
                }
            }

            if let Err(err) = self.compact_cycle() {
                warn!(error = %err, "background compaction failed; retrying next cycle");
            }
        }
        debug!("compaction thread exiting");
    }
}

/// Owner of a segmented append-only log and its key-value projection.
///
/// All methods take `&self`; share the manager between threads with an
/// `Arc`.
///
/// ## Example
///
/// ```rust,no_run
/// use logkv_core::{Config, LogManager};
///
/// let manager = LogManager::open("/tmp/logkv", Config::default())?;
/// manager.set("greeting", "hello")?;
/// assert_eq!(manager.get("greeting")?.as_str(), Some("hello"));
/// manager.stop()?;
/// # Ok::<(), logkv_core::CoreError>(())
/// ```
pub struct LogManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl LogManager {
    /// Creates a manager for `path` without touching the disk.
    ///
    /// Call [`LogManager::start`] before use.
    pub fn new(path: impl AsRef<Path>, config: Config) -> Self {
        let compactor = Compactor::new(config.compaction.clone());
        Self {
            shared: Arc::new(Shared {
                path: path.as_ref().to_path_buf(),
                config,
                compactor,
                segments: RwLock::new(None),
                projection: KeyValueProjection::new(),
                stats: ManagerStats::new(),
                next_version: AtomicU64::new(1),
                cycle_lock: Mutex::new(()),
                compacting: AtomicBool::new(false),
                stop_requested: Mutex::new(false),
                stop_signal: Condvar::new(),
                wrap_backend: None,
            }),
            lifecycle: Mutex::new(Lifecycle::Created),
            timer: Mutex::new(None),
        }
    }

    /// Creates and starts a manager.
    ///
    /// # Errors
    ///
    /// Same as [`LogManager::start`].
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let manager = Self::new(path, config);
        manager.start()?;
        Ok(manager)
    }

    /// Recovers the log and starts serving.
    ///
    /// Opens (and locks) the directory, removes staging files left by an
    /// interrupted rewrite, replays every segment into the projection and
    /// spawns the compaction thread when an interval is configured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the manager was already started,
    /// `DirectoryLocked` if another process holds the directory,
    /// `SegmentCorruption` for a malformed interior record, or the I/O error
    /// that interrupted recovery. On error nothing is served.
    pub fn start(&self) -> CoreResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running => {
                return Err(CoreError::invalid_operation("log manager already started"));
            }
            Lifecycle::Stopped => {
                return Err(CoreError::invalid_operation(
                    "a stopped log manager cannot be restarted",
                ));
            }
        }

        let set = self.shared.recover()?;
        *self.shared.segments.write() = Some(set);

        if self.shared.config.background_compaction_enabled() {
            let shared = Arc::clone(&self.shared);
            let interval = self.shared.config.compaction_interval;
            let spawned = thread::Builder::new()
                .name(COMPACTION_THREAD_NAME.to_string())
                .spawn(move || shared.run_timer(interval));

            match spawned {
                Ok(handle) => *self.timer.lock() = Some(handle),
                Err(err) => {
                    self.shared.segments.write().take();
                    return Err(err.into());
                }
            }
        }

        *lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Stops the compaction thread and closes every segment.
    ///
    /// Waits for an in-flight compaction cycle to finish. Later writes fail
    /// with `ManagerClosed`. Calling `stop` more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first error from syncing a segment. The manager is
    /// stopped either way.
    pub fn stop(&self) -> CoreResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle != Lifecycle::Running {
            *lifecycle = Lifecycle::Stopped;
            return Ok(());
        }

        {
            let mut stop = self.shared.stop_requested.lock();
            *stop = true;
            self.shared.stop_signal.notify_all();
        }
        if let Some(handle) = self.timer.lock().take() {
            if handle.join().is_err() {
                warn!("compaction thread panicked");
            }
        }

        let _cycle = self.shared.cycle_lock.lock();
        let set = self.shared.segments.write().take();
        *lifecycle = Lifecycle::Stopped;

        let mut result = Ok(());
        if let Some(set) = set {
            for segment in set.segments.values() {
                let mut segment = segment.lock();
                if let Err(err) = segment.sync() {
                    warn!(segment = %segment.id(), error = %err, "failed to sync segment on stop");
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }

        info!(path = %self.shared.path.display(), "log manager stopped");
        result
    }

    /// Appends a record to the active segment and applies it.
    ///
    /// Returns once the record is durable (per `sync_on_write`) and visible
    /// to readers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` before any I/O for a record that fails
    /// validation, `ManagerClosed` if the manager is not running, or the
    /// append error. A failed append leaves the projection unchanged.
    pub fn write_record(&self, record: Record) -> CoreResult<()> {
        self.shared.write_record(&record)
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn get(&self, key: &str) -> CoreResult<Value> {
        self.shared.projection.get(key)
    }

    /// Logs a `set` of `payload` under `key` with the next version.
    pub fn set(&self, key: impl Into<String>, payload: impl Into<Payload>) -> CoreResult<()> {
        let version = self.next_version();
        self.write_record(Record::set(key, Value::new(payload, version)))
    }

    /// Logs a `set` carrying a TTL (seconds). The TTL is stored, not enforced.
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        payload: impl Into<Payload>,
        ttl: u64,
    ) -> CoreResult<()> {
        let version = self.next_version();
        self.write_record(Record::set(key, Value::new(payload, version).with_ttl(ttl)))
    }

    /// Logs a `delete` of `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` without logging anything if the key is absent.
    pub fn delete(&self, key: &str) -> CoreResult<()> {
        if !self.shared.projection.contains_key(key) {
            return Err(CoreError::key_not_found(key));
        }
        self.write_record(Record::delete(key))
    }

    /// Runs one compaction cycle now.
    ///
    /// Seals the active segment, opens the next one and rewrites the sealed
    /// segment to one record per key. Returns `Skipped` without waiting if
    /// a cycle is already running.
    ///
    /// # Errors
    ///
    /// Returns `ManagerClosed` if not running, or the error that stopped
    /// the cycle. The sealed segment keeps its previous content on error.
    pub fn compact_now(&self) -> CoreResult<CompactionOutcome> {
        self.shared.compact_cycle()
    }

    /// Returns true while a compaction cycle is running.
    #[must_use]
    pub fn is_compacting(&self) -> bool {
        self.shared.compacting.load(Ordering::SeqCst)
    }

    /// Returns true between a successful `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Running
    }

    /// Returns the number of keys in the projection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.projection.len()
    }

    /// Returns true if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.projection.is_empty()
    }

    /// Returns the projection.
    #[must_use]
    pub fn projection(&self) -> &KeyValueProjection {
        &self.shared.projection
    }

    /// Returns the id of the segment receiving appends, if running.
    #[must_use]
    pub fn active_segment_id(&self) -> Option<SegmentId> {
        self.shared.segments.read().as_ref().map(|set| set.active)
    }

    /// Returns the ids of every open segment, ascending.
    #[must_use]
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.shared
            .segments
            .read()
            .as_ref()
            .map(|set| set.segments.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Returns size and role of every open segment, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns `ManagerClosed` if not running, or a storage error.
    pub fn segment_info(&self) -> CoreResult<Vec<SegmentInfo>> {
        let guard = self.shared.segments.read();
        let set = guard.as_ref().ok_or(CoreError::ManagerClosed)?;

        set.segments
            .iter()
            .map(|(&id, segment)| {
                Ok(SegmentInfo {
                    id,
                    size: segment.lock().size()?,
                    active: id == set.active,
                })
            })
            .collect()
    }

    /// Returns a snapshot of the manager's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Returns the log directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    fn next_version(&self) -> u64 {
        let bumped = self.shared.next_version.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |v| Some(v.saturating_add(1)),
        );
        match bumped {
            Ok(v) | Err(v) => v,
        }
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("path", &self.shared.path)
            .field("lifecycle", &*self.lifecycle.lock())
            .field("active", &self.active_segment_id())
            .field("keys", &self.shared.projection.len())
            .finish_non_exhaustive()
    }
}
