//! # Error Handling
//!
//! Error types for reading sources, running a merge, and persisting positions.
//!
//! ## Overview
//!
//! - **ReadError**: raised by an [`EntryReader`](crate::reader::EntryReader)
//!   while producing entries
//! - **MergeError**: the single termination cause of a merge run
//! - **StoreError**: raised while saving or resuming checkpoints
//!
//! ## Policy
//!
//! There are no retries. Any source failure, consumer failure, or interrupted
//! pump ends the whole run. The first captured cause is the one returned to the
//! caller; later causes only stop their own pump. A consumer asking to stop is
//! not an error.

use crate::position::SourceId;
use thiserror::Error;

/// Boxed error used at the reader and consumer boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a reader while producing entries.
#[derive(Error, Debug)]
pub enum ReadError {
  /// I/O error reading the underlying storage.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  /// The data could not be parsed into entries.
  #[error("format error: {0}")]
  Format(String),
  /// The start offset is not one this reader understands.
  #[error("invalid offset: {0}")]
  InvalidOffset(String),
  /// Any other reader failure.
  #[error("{0}")]
  Other(BoxError),
}

/// Termination cause of a merge run.
#[derive(Error, Debug)]
pub enum MergeError {
  /// A source reader failed.
  #[error("failed to read source {index} ({source_id}, {path}): {source}")]
  Source {
    /// Index of the failing source.
    index: usize,
    /// Id of the failing source.
    source_id: SourceId,
    /// Path of the failing source.
    path: String,
    /// The reader's error.
    source: ReadError,
  },
  /// The consumer raised an error while handling a merged entry.
  #[error("consumer failed: {0}")]
  Consume(BoxError),
  /// A pump task was interrupted before it could report completion.
  #[error("merge interrupted: {0}")]
  Interrupted(String),
  /// A composed start position does not match the configured sources.
  #[error("start position does not match sources: {0}")]
  PositionMismatch(String),
  /// The start offset is not usable for a composed log.
  #[error("invalid start offset: {0}")]
  InvalidStart(String),
  /// The merge configuration is invalid.
  #[error("invalid merge config: {0}")]
  Config(String),
}

/// Error type for checkpoint store operations.
#[derive(Error, Debug)]
pub enum StoreError {
  /// I/O or filesystem error.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  /// Serialization or deserialization failed.
  #[error("serialization error: {0}")]
  Serialization(String),
  /// The stored position belongs to a different composition.
  #[error("checkpoint {name} does not fit this reader: {reason}")]
  Incompatible {
    /// Merged-log name of the checkpoint.
    name: String,
    /// Why the position was rejected.
    reason: String,
  },
}

/// Result type for checkpoint store operations.
pub type StoreResult<T> = Result<T, StoreError>;
