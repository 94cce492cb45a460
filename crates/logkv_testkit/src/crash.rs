//! Crash recovery testing for logkv.
//!
//! Two ways to simulate a crash:
//!
//! 1. **In process**: wrap a backend in [`CrashableBackend`] and tell its
//!    [`CrashControl`] to tear the next write after N bytes, or to fail
//!    sync, truncate or replace calls.
//! 2. **On disk**: with the log closed, damage a segment file with
//!    [`tear_tail`], [`append_partial_record`] or [`insert_garbage_line`],
//!    then reopen and check what recovery keeps.

use logkv_storage::{StorageBackend, StorageError, StorageResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared switches for a [`CrashableBackend`].
///
/// The backend is usually boxed inside a segment, so tests keep an `Arc`
/// to the control and flip it from outside.
#[derive(Debug)]
pub struct CrashControl {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
    fail_on_truncate: AtomicBool,
    fail_on_replace: AtomicBool,
}

impl Default for CrashControl {
    fn default() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
            fail_on_truncate: AtomicBool::new(false),
            fail_on_replace: AtomicBool::new(false),
        }
    }
}

impl CrashControl {
    /// Tears the write that crosses `bytes` more appended bytes, counting
    /// from now.
    pub fn crash_after(&self, bytes: usize) {
        self.bytes_written.store(0, Ordering::SeqCst);
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Sets whether flush and sync fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Sets whether truncate fails.
    pub fn set_fail_on_truncate(&self, fail: bool) {
        self.fail_on_truncate.store(fail, Ordering::SeqCst);
    }

    /// Sets whether replace fails (leaving the content untouched).
    pub fn set_fail_on_replace(&self, fail: bool) {
        self.fail_on_replace.store(fail, Ordering::SeqCst);
    }

    /// Clears every switch.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.bytes_written.store(0, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
        self.fail_on_truncate.store(false, Ordering::SeqCst);
        self.fail_on_replace.store(false, Ordering::SeqCst);
    }

    /// Returns whether a simulated failure has fired.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn fail(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<CrashControl>,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            control: Arc::new(CrashControl::default()),
        }
    }

    /// Returns a handle to this backend's switches.
    pub fn control(&self) -> Arc<CrashControl> {
        Arc::clone(&self.control)
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let control = &self.control;
        let current = control.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        let crash_threshold = control.crash_after_bytes.load(Ordering::SeqCst);

        if current >= crash_threshold {
            return Err(control.fail("write"));
        }

        // Check if this write will cross the crash threshold
        if current + bytes.len() > crash_threshold {
            let partial_len = crash_threshold - current;
            if partial_len > 0 {
                let _ = self.inner.append(&bytes[..partial_len]);
            }
            return Err(control.fail("partial write"));
        }

        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.fail("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.fail("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.control.fail_on_truncate.load(Ordering::SeqCst) {
            return Err(self.control.fail("truncate"));
        }
        self.inner.truncate(new_size)
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        if self.control.fail_on_replace.load(Ordering::SeqCst) {
            return Err(self.control.fail("replace"));
        }
        self.inner.replace(bytes)
    }
}

/// Cuts the last `bytes` bytes off a file, as if the final write was torn.
pub fn tear_tail(path: &Path, bytes: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    file.set_len(len.saturating_sub(bytes))?;
    file.sync_all()
}

/// Appends an unterminated fragment of a record.
pub fn append_partial_record(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(br#"{"operation":"set","key":"torn","value":{"kind":"str"#)?;
    file.sync_all()
}

/// Inserts a malformed line before the existing content, which replay must
/// treat as corruption rather than a torn tail.
pub fn insert_garbage_line(path: &Path) -> io::Result<()> {
    let mut data = b"this is not a record\n".to_vec();
    data.extend_from_slice(&fs::read(path)?);
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logkv_core::{CoreError, Record, Segment, SegmentId, Value};
    use logkv_storage::InMemoryBackend;

    fn crashable_segment() -> (Segment, Arc<CrashControl>) {
        let backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        let control = backend.control();
        (
            Segment::new(SegmentId::new(1), Box::new(backend), true),
            control,
        )
    }

    #[test]
    fn torn_append_is_rolled_back() {
        let (mut segment, control) = crashable_segment();
        segment.append(&Record::set("a", Value::int(1, 1))).unwrap();
        let size = segment.size().unwrap();

        control.crash_after(5);
        let result = segment.append(&Record::set("b", Value::int(2, 2)));
        assert!(result.is_err());
        assert!(control.has_crashed());
        assert_eq!(segment.size().unwrap(), size);

        control.reset();
        segment.append(&Record::set("c", Value::int(3, 3))).unwrap();
        let keys: Vec<String> = segment.replay().unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn failed_rollback_poisons_segment() {
        let (mut segment, control) = crashable_segment();

        control.set_fail_on_sync(true);
        control.set_fail_on_truncate(true);
        assert!(segment.append(&Record::delete("a")).is_err());
        assert!(segment.is_poisoned());

        control.reset();
        let result = segment.append(&Record::delete("b"));
        assert!(matches!(result, Err(CoreError::SegmentPoisoned { .. })));
    }

    #[test]
    fn failed_replace_keeps_content() {
        let (mut segment, control) = crashable_segment();
        segment.append(&Record::set("a", Value::int(1, 1))).unwrap();
        segment.append(&Record::set("a", Value::int(2, 2))).unwrap();

        control.set_fail_on_replace(true);
        assert!(segment.rewrite(&[Record::set("a", Value::int(2, 2))]).is_err());
        assert_eq!(segment.replay().unwrap().len(), 2);
    }

    #[test]
    fn disk_helpers_damage_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment-000001");
        fs::write(&path, b"{\"operation\":\"delete\",\"key\":\"a\"}\n").unwrap();

        append_partial_record(&path).unwrap();
        assert!(!fs::read(&path).unwrap().ends_with(b"\n"));

        tear_tail(&path, 1_000).unwrap();
        assert!(fs::read(&path).unwrap().is_empty());
    }
}
