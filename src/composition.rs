//! # Composed Reader
//!
//! Presents several independently stored logs as one time-ordered log.
//!
//! ## Overview
//!
//! - **merge_read**: merges all sources into a consumer callback
//! - **merge_stream**: the same merge exposed as a `Stream` of entries
//! - **field_types / supported_severities**: schema of the merged log
//! - **EntryReader**: a composed reader is itself a reader, so compositions nest
//!
//! ## Positions
//!
//! Every delivered entry carries [`Offset::Composed`] start and end offsets.
//! Passing an entry's end offset as the `start` of a later run continues right
//! after that entry; its start offset re-delivers it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use logweave::{ComposedReader, LogEntry, LogSource, Offset, SourceId, VecReader};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), logweave::MergeError> {
//! let reader = ComposedReader::new(vec![
//!   LogSource::new(SourceId::new(1), "/var/log/a.log", Arc::new(VecReader::new(vec![]))),
//!   LogSource::new(SourceId::new(2), "/var/log/b.log", Arc::new(VecReader::new(vec![]))),
//! ]);
//! reader
//!   .merge_read(&Offset::Earliest, |entry: LogEntry| -> Result<bool, logweave::BoxError> {
//!     println!("{}", entry.raw_content);
//!     Ok(true)
//!   })
//!   .await?;
//! # Ok(())
//! # }
//! ```

use crate::consumer::{ChannelConsumer, EntryConsumer};
use crate::entry::{FieldType, LogEntry, SeverityLevel};
use crate::error::{MergeError, ReadError};
use crate::merge::{MergeConfig, MergeEngine};
use crate::offset::Offset;
use crate::position::PointerPart;
use crate::reader::{EntryReader, EntrySink, LogSource};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Stream of merged entries; a failure is the final item.
pub type MergedStream = Pin<Box<dyn Stream<Item = Result<LogEntry, MergeError>> + Send>>;

/// A reader merging several sources into one time-ordered log.
#[derive(Debug, Clone)]
pub struct ComposedReader {
  sources: Arc<Vec<LogSource>>,
  config: MergeConfig,
}

impl ComposedReader {
  /// Creates a composed reader over `sources`; their order defines the
  /// source indices used for tie-breaking.
  pub fn new(sources: Vec<LogSource>) -> Self {
    Self {
      sources: Arc::new(sources),
      config: MergeConfig::default(),
    }
  }

  /// Sets the merge configuration.
  #[must_use]
  pub fn with_config(mut self, config: MergeConfig) -> Self {
    self.config = config;
    self
  }

  /// Returns the sources in index order.
  pub fn sources(&self) -> &[LogSource] {
    &self.sources
  }

  /// Returns the merge configuration.
  pub fn config(&self) -> &MergeConfig {
    &self.config
  }

  /// Resolves the per-source start markers for `start`.
  ///
  /// `Earliest` starts every source at its beginning. A composed position
  /// must list exactly one part per source, with matching ids, in order.
  pub fn start_markers(&self, start: &Offset) -> Result<Vec<PointerPart>, MergeError> {
    match start {
      Offset::Earliest => Ok(
        self
          .sources
          .iter()
          .map(|s| PointerPart::new(s.id, s.path.clone(), Offset::Earliest))
          .collect(),
      ),
      Offset::Composed(position) => {
        if position.len() != self.sources.len() {
          return Err(MergeError::PositionMismatch(format!(
            "position has {} parts, reader has {} sources",
            position.len(),
            self.sources.len()
          )));
        }
        self
          .sources
          .iter()
          .zip(position.parts())
          .enumerate()
          .map(|(index, (source, part))| {
            if part.source_id != source.id {
              return Err(MergeError::PositionMismatch(format!(
                "part {} belongs to source {}, expected {}",
                index, part.source_id, source.id
              )));
            }
            Ok(PointerPart::new(source.id, source.path.clone(), part.offset.clone()))
          })
          .collect()
      }
      other => Err(MergeError::InvalidStart(other.to_string())),
    }
  }

  /// Merges all sources from `start`, delivering entries to `consumer` in
  /// `(timestamp, source index)` order.
  ///
  /// Returns normally when every source is exhausted or the consumer asked to
  /// stop, and with the first captured failure otherwise.
  pub async fn merge_read<C>(&self, start: &Offset, consumer: C) -> Result<(), MergeError>
  where
    C: EntryConsumer + 'static,
  {
    self.config.validate()?;
    let markers = self.start_markers(start)?;
    let engine = Arc::new(MergeEngine::new(&self.config, markers, consumer));
    engine.run(self.sources.as_ref().clone()).await
  }

  /// Runs the merge on a spawned task and returns its entries as a stream.
  ///
  /// Dropping the stream stops the merge. Must be called within a tokio
  /// runtime.
  pub fn merge_stream(&self, start: Offset) -> MergedStream {
    let capacity = self.config.stream_capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let reader = self.clone();
    tokio::spawn(async move {
      let failures = sender.clone();
      if let Err(e) = reader.merge_read(&start, ChannelConsumer::new(sender)).await {
        let _ = failures.send(Err(e)).await;
      }
    });
    Box::pin(ReceiverStream::new(receiver))
  }

  /// Union of all sources' fields. A name keeps the position where it first
  /// appeared; a later source redefining it overrides the type.
  pub fn field_types(&self) -> Vec<(String, FieldType)> {
    let mut fields: Vec<(String, FieldType)> = Vec::new();
    for source in self.sources.iter() {
      for (name, field_type) in source.reader.field_types() {
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
          Some(slot) => slot.1 = field_type,
          None => fields.push((name, field_type)),
        }
      }
    }
    fields
  }

  /// Deduplicated union of all sources' severities, sorted by ordinal.
  pub fn supported_severities(&self) -> Vec<SeverityLevel> {
    self
      .sources
      .iter()
      .flat_map(|source| source.reader.supported_severities())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }
}

#[async_trait]
impl EntryReader for ComposedReader {
  async fn read_entries(&self, start: &Offset, sink: &mut dyn EntrySink) -> Result<(), ReadError> {
    // Fail fast on a bad start before spawning anything.
    self
      .start_markers(start)
      .map_err(|e| ReadError::InvalidOffset(e.to_string()))?;

    let mut entries = self.merge_stream(start.clone());
    while let Some(item) = entries.next().await {
      match item {
        Ok(entry) => {
          if !sink.accept(entry).await {
            break;
          }
        }
        Err(e) => return Err(ReadError::Other(Box::new(e))),
      }
    }
    Ok(())
  }

  fn field_types(&self) -> Vec<(String, FieldType)> {
    ComposedReader::field_types(self)
  }

  fn supported_severities(&self) -> Vec<SeverityLevel> {
    ComposedReader::supported_severities(self)
  }
}
