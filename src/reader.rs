//! # Entry Readers
//!
//! The boundary to per-source readers. A reader sequentially produces the
//! entries of one log from a start [`Offset`], pushing each one into an
//! [`EntrySink`] until the log is exhausted, the sink asks to stop, or the
//! read fails.
//!
//! [`LogSource`] describes one source of a composition: its stable id, its
//! path, and the reader that owns access to its storage.

use crate::entry::{FieldType, LogEntry, SeverityLevel};
use crate::error::ReadError;
use crate::offset::Offset;
use crate::position::SourceId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Receives entries from a reader.
#[async_trait]
pub trait EntrySink: Send {
  /// Accepts one entry. Returning `false` asks the reader to stop.
  async fn accept(&mut self, entry: LogEntry) -> bool;
}

/// Sequential reader over one log.
#[async_trait]
pub trait EntryReader: Send + Sync {
  /// Reads entries starting at `start` and pushes them into `sink` in
  /// source-local order.
  ///
  /// Returns `Ok(())` when the log is exhausted or the sink returned `false`.
  async fn read_entries(&self, start: &Offset, sink: &mut dyn EntrySink) -> Result<(), ReadError>;

  /// Fields this reader extracts, in display order.
  fn field_types(&self) -> Vec<(String, FieldType)> {
    Vec::new()
  }

  /// Severity levels this reader can assign.
  fn supported_severities(&self) -> Vec<SeverityLevel> {
    Vec::new()
  }
}

/// Descriptor of one source taking part in a merge.
#[derive(Clone)]
pub struct LogSource {
  /// Stable id of the source.
  pub id: SourceId,
  /// Path of the source log.
  pub path: String,
  /// Reader producing the source's entries.
  pub reader: Arc<dyn EntryReader>,
}

impl LogSource {
  /// Creates a source descriptor.
  pub fn new(id: SourceId, path: impl Into<String>, reader: Arc<dyn EntryReader>) -> Self {
    Self {
      id,
      path: path.into(),
      reader,
    }
  }
}

impl fmt::Debug for LogSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LogSource")
      .field("id", &self.id)
      .field("path", &self.path)
      .finish_non_exhaustive()
  }
}

/// A reader that yields entries from a `Vec`.
///
/// Offsets are entry indices: the entry at index `i` is stamped with
/// `Sequence(i)` as start and `Sequence(i + 1)` as end, and reading from
/// `Sequence(n)` skips the first `n` entries. Useful for tests and for
/// replaying already-materialized logs.
#[derive(Debug, Clone, Default)]
pub struct VecReader {
  entries: Vec<LogEntry>,
  fields: Vec<(String, FieldType)>,
  severities: Vec<SeverityLevel>,
}

impl VecReader {
  /// Creates a reader over the given entries.
  pub fn new(entries: Vec<LogEntry>) -> Self {
    Self {
      entries,
      ..Self::default()
    }
  }

  /// Sets the advertised fields.
  #[must_use]
  pub fn with_fields(mut self, fields: Vec<(String, FieldType)>) -> Self {
    self.fields = fields;
    self
  }

  /// Sets the advertised severities.
  #[must_use]
  pub fn with_severities(mut self, severities: Vec<SeverityLevel>) -> Self {
    self.severities = severities;
    self
  }

  /// Returns the number of entries.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns true if the reader has no entries.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[async_trait]
impl EntryReader for VecReader {
  async fn read_entries(&self, start: &Offset, sink: &mut dyn EntrySink) -> Result<(), ReadError> {
    let first = match start {
      Offset::Earliest => 0,
      Offset::Sequence(n) => usize::try_from(*n).map_err(|_| ReadError::InvalidOffset(start.to_string()))?,
      other => return Err(ReadError::InvalidOffset(other.to_string())),
    };

    for (index, entry) in self.entries.iter().enumerate().skip(first) {
      let entry = entry
        .clone()
        .with_offsets(Offset::Sequence(index as u64), Offset::Sequence(index as u64 + 1));
      if !sink.accept(entry).await {
        break;
      }
    }
    Ok(())
  }

  fn field_types(&self) -> Vec<(String, FieldType)> {
    self.fields.clone()
  }

  fn supported_severities(&self) -> Vec<SeverityLevel> {
    self.severities.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Collect(Vec<LogEntry>, usize);

  #[async_trait]
  impl EntrySink for Collect {
    async fn accept(&mut self, entry: LogEntry) -> bool {
      self.0.push(entry);
      self.0.len() < self.1
    }
  }

  fn reader() -> VecReader {
    VecReader::new(vec![LogEntry::new("a"), LogEntry::new("b"), LogEntry::new("c")])
  }

  #[tokio::test]
  async fn test_vec_reader_stamps_offsets() {
    let mut sink = Collect(Vec::new(), usize::MAX);
    reader().read_entries(&Offset::Earliest, &mut sink).await.unwrap();

    assert_eq!(sink.0.len(), 3);
    assert_eq!(sink.0[1].start_offset, Some(Offset::Sequence(1)));
    assert_eq!(sink.0[1].end_offset, Some(Offset::Sequence(2)));
  }

  #[tokio::test]
  async fn test_vec_reader_resumes_from_sequence() {
    let mut sink = Collect(Vec::new(), usize::MAX);
    reader().read_entries(&Offset::Sequence(2), &mut sink).await.unwrap();

    assert_eq!(sink.0.len(), 1);
    assert_eq!(sink.0[0].raw_content, "c");
  }

  #[tokio::test]
  async fn test_vec_reader_stops_when_sink_declines() {
    let mut sink = Collect(Vec::new(), 1);
    reader().read_entries(&Offset::Earliest, &mut sink).await.unwrap();
    assert_eq!(sink.0.len(), 1);
  }

  #[tokio::test]
  async fn test_vec_reader_rejects_custom_offset() {
    let mut sink = Collect(Vec::new(), usize::MAX);
    let result = reader().read_entries(&Offset::custom("x"), &mut sink).await;
    assert!(matches!(result, Err(ReadError::InvalidOffset(_))));
  }
}
