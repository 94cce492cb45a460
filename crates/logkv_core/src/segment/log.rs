//! A single segment file.

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RECORD_DELIMITER};
use crate::types::SegmentId;
use logkv_storage::StorageBackend;
use serde_json::error::Category;
use tracing::{debug, warn};

/// Outcome of reading a segment from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentScan {
    /// Every complete, well-formed record in file order.
    pub records: Vec<Record>,
    /// Byte length of the well-formed prefix.
    pub valid_len: u64,
    /// Bytes after `valid_len` that were discarded as a torn tail.
    pub discarded_bytes: u64,
}

impl SegmentScan {
    /// Returns true if a torn trailing record was discarded.
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.discarded_bytes > 0
    }
}

/// One append-only log file.
///
/// A `Segment` owns its storage backend. It is not internally synchronized;
/// the log manager wraps each segment in a mutex.
pub struct Segment {
    id: SegmentId,
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
    poisoned: bool,
}

impl Segment {
    /// Creates a segment over the given backend.
    ///
    /// With `sync_on_write` set, every append is fsynced before it returns.
    pub fn new(id: SegmentId, backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            id,
            backend,
            sync_on_write,
            poisoned: false,
        }
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the current size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Returns true if a failed append could not be rolled back.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Appends a record and makes it durable.
    ///
    /// Returns the offset of the record. If the write or the durability
    /// barrier fails the segment is truncated back to its previous size, so
    /// the file is unchanged when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `SegmentPoisoned` if an earlier rollback failed, or the
    /// storage error that interrupted this append.
    pub fn append(&mut self, record: &Record) -> CoreResult<u64> {
        if self.poisoned {
            return Err(CoreError::SegmentPoisoned { segment: self.id });
        }

        let line = record.encode_line()?;
        let previous_size = self.backend.size()?;

        match self.write_durably(&line) {
            Ok(offset) => Ok(offset),
            Err(err) => {
                self.roll_back(previous_size);
                Err(err)
            }
        }
    }

    fn write_durably(&mut self, line: &[u8]) -> CoreResult<u64> {
        let offset = self.backend.append(line)?;
        self.backend.flush()?;
        if self.sync_on_write {
            self.backend.sync()?;
        }
        Ok(offset)
    }

    fn roll_back(&mut self, size: u64) {
        if let Err(err) = self.backend.truncate(size) {
            warn!(segment = %self.id, error = %err, "rollback of failed append failed; poisoning segment");
            self.poisoned = true;
        }
    }

    /// Reads every record from the start of the file.
    ///
    /// A torn final fragment is silently discarded.
    ///
    /// # Errors
    ///
    /// Returns `SegmentCorruption` for a malformed interior line, or the
    /// storage error that prevented the read.
    pub fn replay(&self) -> CoreResult<Vec<Record>> {
        Ok(self.scan()?.records)
    }

    /// Reads the file and reports where the well-formed prefix ends.
    ///
    /// # Errors
    ///
    /// Same as [`Segment::replay`].
    pub fn scan(&self) -> CoreResult<SegmentScan> {
        let data = self.backend.read_all()?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut valid_len = 0usize;
        let mut line_no = 0usize;

        while offset < data.len() {
            line_no += 1;
            let rest = &data[offset..];

            let Some(pos) = rest.iter().position(|&b| b == RECORD_DELIMITER) else {
                // Unterminated: the append never completed.
                break;
            };

            let line = &rest[..pos];
            let next = offset + pos + 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                offset = next;
                valid_len = next;
                continue;
            }

            match Record::decode_line(line) {
                Ok(record) => {
                    records.push(record);
                    valid_len = next;
                }
                // A final line that is not even JSON is a torn write.
                // Well-formed JSON that fails to decode is corruption
                // wherever it sits.
                Err(err) if next == data.len() && is_torn(&err) => break,
                Err(err) => {
                    return Err(CoreError::segment_corruption(
                        self.id,
                        line_no,
                        err.to_string(),
                    ));
                }
            }

            offset = next;
        }

        let discarded_bytes = (data.len() - valid_len) as u64;
        if discarded_bytes > 0 {
            debug!(segment = %self.id, discarded_bytes, "ignoring torn trailing record");
        }

        Ok(SegmentScan {
            records,
            valid_len: valid_len as u64,
            discarded_bytes,
        })
    }

    /// Scans the segment and truncates any torn tail.
    ///
    /// Used at startup so that appends to a recovered segment never land
    /// after a partial record.
    ///
    /// # Errors
    ///
    /// Same as [`Segment::replay`], plus truncation failures.
    pub fn recover(&mut self) -> CoreResult<SegmentScan> {
        let scan = self.scan()?;
        if scan.has_torn_tail() {
            warn!(
                segment = %self.id,
                discarded_bytes = scan.discarded_bytes,
                "truncating torn trailing record"
            );
            self.backend.truncate(scan.valid_len)?;
        }
        Ok(scan)
    }

    /// Atomically replaces the file with exactly `records`, in order.
    ///
    /// # Errors
    ///
    /// Returns the encoding or storage error. On error the previous content
    /// is left in place.
    pub fn rewrite(&mut self, records: &[Record]) -> CoreResult<()> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode_line()?);
        }

        self.backend.replace(&data)?;
        self.poisoned = false;
        Ok(())
    }

    /// Forces everything appended so far to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }
}

fn is_torn(err: &serde_json::Error) -> bool {
    matches!(err.classify(), Category::Eof | Category::Syntax)
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("sync_on_write", &self.sync_on_write)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
