//! Heap-backed segment storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// Segment bytes kept in a `Vec`.
///
/// Nothing here survives the process, so `flush` and `sync` succeed without
/// doing anything. Writers already hold `&mut self`, which makes `replace`
/// a plain buffer swap.
///
/// ```rust
/// use logkv_storage::{InMemoryBackend, StorageBackend};
///
/// let mut store = InMemoryBackend::new();
/// store.append(b"{}\n").unwrap();
/// assert_eq!(store.append(b"{}\n").unwrap(), 3);
/// assert_eq!(store.size().unwrap(), 6);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    bytes: Vec<u8>,
}

impl InMemoryBackend {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `bytes`, e.g. hand-written segment content.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Copies out the current content.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.len();
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(len)?))
            .filter(|range| range.end <= self.bytes.len());

        match range {
            Some(range) => Ok(self.bytes[range].to_vec()),
            None => Err(StorageError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let at = self.len();
        self.bytes.extend_from_slice(data);
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.len())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let size = self.len();
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        // new_size <= len, so the cast cannot lose bits.
        self.bytes.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.bytes = data.to_vec();
        Ok(())
    }
}
