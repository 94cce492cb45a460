//! Core type definitions for logkv.

use std::fmt;

/// File name prefix shared by every segment file.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Identifier of a segment.
///
/// Segment ids are assigned in strictly increasing order and never reused.
/// Gaps are allowed once an empty segment has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// The id given to the first segment of a fresh log.
    pub const FIRST: Self = Self(1);

    /// Creates a new segment id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next segment id, or `None` once ids are exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the file name for this segment (`segment-000042`).
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{SEGMENT_PREFIX}{:06}", self.0)
    }

    /// Parses a segment id out of a file name.
    ///
    /// Only the exact name [`SegmentId::file_name`] produces is accepted.
    /// `segment-7` would otherwise alias `segment-000007`, so it returns
    /// `None`, as do staging files such as `segment-000001.tmp`.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(SEGMENT_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = Self(digits.parse().ok()?);
        (id.file_name() == name).then_some(id)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(SegmentId::new(1).file_name(), "segment-000001");
        assert_eq!(SegmentId::new(1_234_567).file_name(), "segment-1234567");
    }

    #[test]
    fn parse_file_names() {
        assert_eq!(
            SegmentId::from_file_name("segment-000042"),
            Some(SegmentId::new(42))
        );
        assert_eq!(
            SegmentId::from_file_name("segment-1234567"),
            Some(SegmentId::new(1_234_567))
        );
        assert_eq!(SegmentId::from_file_name("segment-7"), None);
        assert_eq!(SegmentId::from_file_name("segment-0000007"), None);
        assert_eq!(SegmentId::from_file_name("segment-000001.tmp"), None);
        assert_eq!(SegmentId::from_file_name("segment-"), None);
        assert_eq!(SegmentId::from_file_name("segment-+3"), None);
        assert_eq!(SegmentId::from_file_name("LOCK"), None);
    }

    #[test]
    fn ids_order_numerically() {
        let mut ids = vec![SegmentId::new(10), SegmentId::new(2), SegmentId::new(9)];
        ids.sort();
        assert_eq!(ids, vec![SegmentId::new(2), SegmentId::new(9), SegmentId::new(10)]);
        assert_eq!(SegmentId::FIRST.next(), Some(SegmentId::new(2)));
        assert_eq!(SegmentId::new(u64::MAX).next(), None);
    }
}
