//! Log entries and the schema vocabulary readers describe them with.

use crate::offset::Offset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field stamped on merged entries with the originating source id.
pub const FIELD_SOURCE_ID: &str = "_source_id";
/// Field stamped on merged entries with the originating log path.
pub const FIELD_LOG_PATH: &str = "_log_path";

/// Base type of an entry field, as advertised by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
  /// Free text.
  String,
  /// Signed integer.
  Integer,
  /// Floating point number.
  Float,
  /// Boolean flag.
  Boolean,
  /// Point in time.
  Date,
  /// A [`SeverityLevel`].
  Severity,
  /// Arbitrary structured value.
  Object,
}

/// A severity level a reader can assign to entries.
///
/// Levels order by ordinal first, so `DEBUG < INFO < WARN` when the reader
/// numbers them that way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeverityLevel {
  /// Numeric rank; higher is more severe.
  pub ordinal: i32,
  /// Display name.
  pub name: String,
}

impl SeverityLevel {
  /// Creates a severity level.
  pub fn new(name: impl Into<String>, ordinal: i32) -> Self {
    Self {
      ordinal,
      name: name.into(),
    }
  }
}

/// One record produced by a reader.
///
/// Readers fill `start_offset`/`end_offset` with source-local offsets; the merge
/// replaces them with [`Offset::Composed`] positions before delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  /// Offset at which this entry starts.
  pub start_offset: Option<Offset>,
  /// Offset directly after this entry.
  pub end_offset: Option<Offset>,
  /// Event time, if the reader could parse one.
  pub timestamp: Option<DateTime<Utc>>,
  /// Severity, if the reader assigns one.
  pub severity: Option<SeverityLevel>,
  /// Unparsed text of the entry.
  pub raw_content: String,
  /// Parsed fields.
  pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
  /// Creates an entry with the given raw content and no offsets.
  pub fn new(raw_content: impl Into<String>) -> Self {
    Self {
      raw_content: raw_content.into(),
      ..Self::default()
    }
  }

  /// Sets the event time.
  #[must_use]
  pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = Some(timestamp);
    self
  }

  /// Sets the source-local start and end offsets.
  #[must_use]
  pub fn with_offsets(mut self, start: Offset, end: Offset) -> Self {
    self.start_offset = Some(start);
    self.end_offset = Some(end);
    self
  }

  /// Sets the severity.
  #[must_use]
  pub fn with_severity(mut self, severity: SeverityLevel) -> Self {
    self.severity = Some(severity);
    self
  }

  /// Inserts a field value, replacing any previous value.
  pub fn put(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
    self.fields.insert(name.into(), value.into());
  }

  /// Returns a field value.
  pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
    self.fields.get(name)
  }

  /// Returns the event time in milliseconds since the epoch, 0 when absent.
  pub fn timestamp_millis(&self) -> i64 {
    self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
  }
}
