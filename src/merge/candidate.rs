//! Buffered candidates and their ordering key.

use crate::entry::LogEntry;
use crate::position::SourceId;

/// Global ordering key: timestamp, then source index, then production order.
///
/// The sequence component keeps entries of one source that share a timestamp
/// in the order the source produced them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CandidateKey {
  /// Event time in epoch milliseconds, 0 when the entry has none.
  pub timestamp_millis: i64,
  /// Index of the producing source.
  pub source_index: usize,
  /// Pump-local production counter.
  pub sequence: u64,
}

/// An entry offered to the merge engine, pending proof that no earlier entry
/// can still arrive.
#[derive(Debug)]
pub struct Candidate {
  /// Index of the producing source.
  pub source_index: usize,
  /// Pump-local production counter.
  pub sequence: u64,
  /// Id of the producing source.
  pub source_id: SourceId,
  /// Path of the producing source.
  pub path: String,
  /// The entry itself.
  pub entry: LogEntry,
}

impl Candidate {
  /// Wraps an entry read from source `source_index`.
  pub fn new(
    source_index: usize,
    sequence: u64,
    source_id: SourceId,
    path: impl Into<String>,
    entry: LogEntry,
  ) -> Self {
    Self {
      source_index,
      sequence,
      source_id,
      path: path.into(),
      entry,
    }
  }

  /// Returns the ordering key.
  pub fn key(&self) -> CandidateKey {
    CandidateKey {
      timestamp_millis: self.entry.timestamp_millis(),
      source_index: self.source_index,
      sequence: self.sequence,
    }
  }
}
