//! Log directory management.
//!
//! ```text
//! <dir>/
//! ├─ LOCK                 # Advisory lock for single-process access
//! ├─ segment-000001       # Sealed segment
//! ├─ segment-000002       # Active segment (highest id)
//! └─ segment-000002.tmp   # Staging file, only while a rewrite is in flight
//! ```
//!
//! The LOCK file ensures only one process opens the log at a time. A staging
//! file found at open time belongs to a rewrite that never reached its
//! rename; the segment itself still holds its previous content, so the
//! staging file is simply deleted.

use crate::error::{CoreError, CoreResult};
use crate::types::{SegmentId, SEGMENT_PREFIX};
use fs2::FileExt;
use logkv_storage::{FileBackend, TEMP_SUFFIX};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";

/// An opened log directory holding the exclusive lock.
#[derive(Debug)]
pub struct LogDir {
    path: PathBuf,
    _lock_file: File,
}

impl LogDir {
    /// Opens (or creates) a log directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (`DirectoryLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "log directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of a segment file.
    #[must_use]
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.path.join(id.file_name())
    }

    /// Lists segment ids present on disk, ascending.
    ///
    /// Files that are not segments (the lock file, staging files) are
    /// skipped. A file that starts like a segment but has no valid id is an
    /// error, since silently ignoring it could hide data.
    pub fn list_segments(&self) -> CoreResult<Vec<SegmentId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name == LOCK_FILE || name.ends_with(TEMP_SUFFIX) {
                continue;
            }

            match SegmentId::from_file_name(name) {
                Some(id) => ids.push(id),
                None if name.starts_with(SEGMENT_PREFIX) => {
                    return Err(CoreError::InvalidSegmentName {
                        name: name.to_string(),
                    });
                }
                None => debug!(file = name, "ignoring non-segment file"),
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Deletes staging files left behind by interrupted rewrites.
    ///
    /// Returns how many were removed.
    pub fn remove_stale_temp_files(&self) -> CoreResult<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name.starts_with(SEGMENT_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                warn!(file = name, "removing staging file from interrupted rewrite");
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.sync()?;
        }
        Ok(removed)
    }

    /// Opens (creating if needed) the backend for a segment file.
    pub fn open_segment_backend(&self, id: SegmentId) -> CoreResult<FileBackend> {
        Ok(FileBackend::open(&self.segment_path(id))?)
    }

    /// Deletes a segment file and makes the deletion durable.
    pub fn remove_segment(&self, id: SegmentId) -> CoreResult<()> {
        fs::remove_file(self.segment_path(id))?;
        self.sync()
    }

    /// Syncs the directory so created, renamed or deleted entries are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs the directory so created, renamed or deleted entries are durable.
    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        // NTFS journals metadata; directories cannot be fsynced on Windows.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("log");

        let dir = LogDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn open_missing_without_create_fails() {
        let temp = tempdir().unwrap();
        let result = LogDir::open(&temp.path().join("missing"), false);
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn second_open_is_locked_out() {
        let temp = tempdir().unwrap();
        let _first = LogDir::open(temp.path(), true).unwrap();

        let second = LogDir::open(temp.path(), true);
        assert!(matches!(second, Err(CoreError::DirectoryLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(LogDir::open(temp.path(), true).unwrap());
        assert!(LogDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn list_segments_sorted_and_filtered() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        for id in [10, 2, 7] {
            File::create(dir.segment_path(SegmentId::new(id))).unwrap();
        }
        File::create(temp.path().join("segment-000007.tmp")).unwrap();
        File::create(temp.path().join("notes.txt")).unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();

        let ids = dir.list_segments().unwrap();
        assert_eq!(
            ids,
            vec![SegmentId::new(2), SegmentId::new(7), SegmentId::new(10)]
        );
    }

    #[test]
    fn malformed_segment_name_is_an_error() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        File::create(temp.path().join("segment-abc")).unwrap();

        let result = dir.list_segments();
        assert!(matches!(result, Err(CoreError::InvalidSegmentName { name }) if name == "segment-abc"));
    }

    #[test]
    fn unpadded_segment_name_is_an_error() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        fs::write(temp.path().join("segment-7"), b"{}\n").unwrap();

        let result = dir.list_segments();
        assert!(matches!(result, Err(CoreError::InvalidSegmentName { name }) if name == "segment-7"));
        assert!(!dir.segment_path(SegmentId::new(7)).exists());
    }

    #[test]
    fn stale_temp_files_are_removed() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        fs::write(dir.segment_path(SegmentId::new(1)), b"keep\n").unwrap();
        fs::write(temp.path().join("segment-000001.tmp"), b"half").unwrap();

        assert_eq!(dir.remove_stale_temp_files().unwrap(), 1);
        assert!(!temp.path().join("segment-000001.tmp").exists());
        assert_eq!(fs::read(dir.segment_path(SegmentId::new(1))).unwrap(), b"keep\n");
    }

    #[test]
    fn remove_segment_deletes_file() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let id = SegmentId::new(4);

        dir.open_segment_backend(id).unwrap();
        assert!(dir.segment_path(id).exists());

        dir.remove_segment(id).unwrap();
        assert!(!dir.segment_path(id).exists());
        assert!(dir.list_segments().unwrap().is_empty());
    }
}
