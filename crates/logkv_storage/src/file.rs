//! Segment storage on a regular file.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the staging file a `replace` writes before renaming it into
/// place. Leftovers with this suffix are safe to delete.
pub const TEMP_SUFFIX: &str = ".tmp";

/// A segment file on disk.
///
/// The cached length is authoritative: the file is only ever changed
/// through this handle while the log directory is locked.
///
/// | call       | what reaches the OS                                     |
/// |------------|---------------------------------------------------------|
/// | `flush`    | `File::flush`                                           |
/// | `sync`     | `File::sync_all`                                        |
/// | `truncate` | `set_len` followed by `sync_all`                        |
/// | `replace`  | staging file, `sync_all`, rename, directory sync        |
///
/// ```no_run
/// use logkv_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut segment = FileBackend::open(Path::new("segment-000001")).unwrap();
/// segment.append(b"{\"operation\":\"delete\",\"key\":\"k\"}\n").unwrap();
/// segment.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    // Reads seek, so they need exclusive access to the handle too.
    handle: Mutex<File>,
    len: u64,
}

fn open_rw(path: &Path, create: bool) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .open(path)
}

impl FileBackend {
    /// Opens `path`, creating an empty file when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the file cannot be opened or
    /// its metadata read.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = open_rw(path, true)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            handle: Mutex::new(file),
            len,
        })
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where `replace` stages the new content.
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }

    fn check_range(&self, offset: u64, len: usize) -> StorageResult<()> {
        let fits = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.len);
        if fits {
            Ok(())
        } else {
            Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.len,
            })
        }
    }
}

/// `segment-000003` becomes `segment-000003.tmp`.
#[must_use]
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

fn write_durably(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut staged = File::create(path)?;
    staged.write_all(data)?;
    staged.sync_all()
}

#[cfg(unix)]
fn sync_containing_dir(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_containing_dir(_path: &Path) -> std::io::Result<()> {
    // Directory handles cannot be fsynced here.
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut buf = vec![0u8; len];
        if len > 0 {
            let mut file = self.handle.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let start = self.len;
        if !data.is_empty() {
            let file = self.handle.get_mut();
            file.seek(SeekFrom::Start(start))?;
            file.write_all(data)?;
            self.len = start + data.len() as u64;
        }
        Ok(start)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(self.handle.get_mut().flush()?)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(self.handle.get_mut().sync_all()?)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.len {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: self.len,
            });
        }
        let file = self.handle.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.len = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.replace_then(data, sync_containing_dir)
    }
}

impl FileBackend {
    fn replace_then(
        &mut self,
        data: &[u8],
        sync_dir: fn(&Path) -> std::io::Result<()>,
    ) -> StorageResult<()> {
        let staging = self.temp_path();

        let swapped = write_durably(&staging, data).and_then(|()| fs::rename(&staging, &self.path));
        if let Err(err) = swapped {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }

        // The previous handle refers to the inode the rename unlinked, so
        // switch to the new file before reporting a directory sync failure.
        *self.handle.get_mut() = open_rw(&self.path, false)?;
        self.len = data.len() as u64;
        sync_dir(&self.path)?;
        Ok(())
    }
}
