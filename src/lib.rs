//! # LogWeave
//!
//! Time-ordered, resumable merging of independently read log sources.
//!
//! Each source is read by its own [`EntryReader`] on its own task. The merge
//! engine interleaves their entries into one stream ordered by
//! `(timestamp, source index)`, keeps every source's buffer bounded, and stamps
//! each delivered entry with a [`ComposedPosition`] that records the read
//! position of *every* source, so the merged stream can be resumed exactly.
//!
//! ## Key Features
//!
//! - **Global ordering**: non-decreasing `(timestamp, source index)` delivery
//! - **Backpressure**: at most `buffer_per_source` undelivered entries per source
//! - **Resumable**: composed start/end positions on every entry, kept across
//!   restarts by a [`PositionTracker`]
//! - **Cancellation**: a consumer returning `false` ends the run cleanly
//! - **Fail-fast**: the first source or consumer failure ends the run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logweave::{ComposedReader, LogEntry, LogSource, Offset, SourceId, VecReader};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), logweave::MergeError> {
//! let reader = ComposedReader::new(vec![
//!   LogSource::new(SourceId::new(1), "a.log", Arc::new(VecReader::new(vec![LogEntry::new("a")]))),
//!   LogSource::new(SourceId::new(2), "b.log", Arc::new(VecReader::new(vec![LogEntry::new("b")]))),
//! ]);
//! reader
//!   .merge_read(&Offset::Earliest, |e: LogEntry| -> Result<bool, logweave::BoxError> {
//!     Ok(!e.raw_content.is_empty())
//!   })
//!   .await?;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Composed reader: merged reads, streams, and schema unions.
pub mod composition;
/// Consumers of merged entries.
pub mod consumer;
/// Log entries, fields, and severities.
pub mod entry;
/// Error types.
pub mod error;
/// K-way merge engine and source pumps.
pub mod merge;
/// Per-source offsets.
pub mod offset;
/// Composed positions and offset markers.
pub mod position;
/// Reader boundary and source descriptors.
pub mod reader;
/// Resume checkpoints for merged logs.
pub mod store;

pub use composition::{ComposedReader, MergedStream};
pub use consumer::{ChannelConsumer, EntryConsumer, TrackingConsumer};
pub use entry::{FIELD_LOG_PATH, FIELD_SOURCE_ID, FieldType, LogEntry, SeverityLevel};
pub use error::{BoxError, MergeError, ReadError, StoreError, StoreResult};
pub use merge::{MergeConfig, MergeEngine, RunState};
pub use offset::Offset;
pub use position::{ComposedPosition, PointerPart, SourceId};
pub use reader::{EntryReader, EntrySink, LogSource, VecReader};
pub use store::{
  CHECKPOINT_FILE_VERSION, Checkpoint, CommitStrategy, FilePositionStore, InMemoryPositionStore,
  PositionStore, PositionTracker,
};

#[cfg(test)]
mod position_test;
#[cfg(test)]
mod store_test;
