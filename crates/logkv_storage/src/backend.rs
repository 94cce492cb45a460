//! The byte-store contract a segment writes through.

use crate::error::StorageResult;

/// Raw bytes underneath one segment.
///
/// Implementations promise:
///
/// - offsets handed out by `append` stay valid until the next `truncate` or
///   `replace`, and `read_at` at such an offset returns what was appended
/// - after `sync` returns, everything appended so far survives a crash
/// - `replace` is all-or-nothing across a crash
///
/// [`crate::FileBackend`] is the persistent implementation and
/// [`crate::InMemoryBackend`] backs tests.
pub trait StorageBackend: Send + Sync {
    /// Returns the `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// [`crate::StorageError::ReadPastEnd`] if the range is not fully
    /// inside the store, or an I/O failure.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Returns every byte in the store.
    ///
    /// # Errors
    ///
    /// Fails when the store is larger than the address space or the read
    /// fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("segment of {size} bytes cannot be loaded"),
            )
        })?;
        self.read_at(0, len)
    }

    /// Writes `data` at the end and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// On failure part of `data` may already be in the store. Callers
    /// roll back with [`StorageBackend::truncate`].
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Hands buffered bytes to the operating system without waiting for
    /// the disk.
    ///
    /// # Errors
    ///
    /// Propagates the underlying flush failure.
    fn flush(&mut self) -> StorageResult<()>;

    /// Current length in bytes.
    ///
    /// # Errors
    ///
    /// Propagates metadata failures.
    fn size(&self) -> StorageResult<u64>;

    /// Durability barrier for data and metadata.
    ///
    /// # Errors
    ///
    /// Propagates the underlying sync failure. Nothing may be assumed
    /// durable afterwards.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shrinks the store to `new_size` bytes. Undoes a failed append and
    /// drops a torn final line during recovery.
    ///
    /// # Errors
    ///
    /// [`crate::StorageError::TruncateBeyondEnd`] when `new_size` exceeds
    /// the current length, or an I/O failure.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Swaps the whole content for `data`, durably.
    ///
    /// # Errors
    ///
    /// On any failure the previous content is still what the store holds.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
