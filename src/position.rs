//! Composed positions: resumable cursors over a merged stream.
//!
//! A [`ComposedPosition`] holds one [`PointerPart`] per configured source, in
//! source-index order, plus the timestamp of the entry it was minted for.
//! Feeding its parts back as the per-source start offsets of a new run resumes
//! the merge exactly after (or before) that entry.

use crate::offset::Offset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Stable identifier of a log source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl SourceId {
  /// Creates a new source id from a raw value.
  #[inline]
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Returns the raw u64 value.
  #[inline]
  pub const fn as_u64(self) -> u64 {
    self.0
  }
}

impl Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Last known read position of one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerPart {
  /// Source the offset belongs to.
  pub source_id: SourceId,
  /// Path of the source log.
  pub path: String,
  /// Source-local offset.
  pub offset: Offset,
}

impl PointerPart {
  /// Creates a new offset marker.
  pub fn new(source_id: SourceId, path: impl Into<String>, offset: Offset) -> Self {
    Self {
      source_id,
      path: path.into(),
      offset,
    }
  }
}

impl Display for PointerPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}@{}", self.source_id, self.path, self.offset)
  }
}

/// Snapshot of every source's offset marker at one point of a merged stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComposedPosition {
  parts: Vec<PointerPart>,
  timestamp: Option<DateTime<Utc>>,
}

impl ComposedPosition {
  /// Creates a position from marker parts and a representative timestamp.
  pub fn new(parts: Vec<PointerPart>, timestamp: Option<DateTime<Utc>>) -> Self {
    Self { parts, timestamp }
  }

  /// Deep-copies the current marker array into an immutable snapshot.
  pub fn snapshot(markers: &[PointerPart], timestamp: Option<DateTime<Utc>>) -> Self {
    Self::new(markers.to_vec(), timestamp)
  }

  /// Returns the marker parts in source-index order.
  pub fn parts(&self) -> &[PointerPart] {
    &self.parts
  }

  /// Consumes the position and returns its marker parts.
  pub fn into_parts(self) -> Vec<PointerPart> {
    self.parts
  }

  /// Returns the representative timestamp.
  pub fn timestamp(&self) -> Option<DateTime<Utc>> {
    self.timestamp
  }

  /// Returns the number of sources covered by this position.
  pub fn len(&self) -> usize {
    self.parts.len()
  }

  /// Returns true if the position covers no sources.
  pub fn is_empty(&self) -> bool {
    self.parts.is_empty()
  }

  /// Looks up the offset recorded for a source.
  pub fn offset_of(&self, source_id: SourceId) -> Option<&Offset> {
    self
      .parts
      .iter()
      .find(|part| part.source_id == source_id)
      .map(|part| &part.offset)
  }
}

impl Display for ComposedPosition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, part) in self.parts.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", part)?;
    }
    write!(f, "]")
  }
}
