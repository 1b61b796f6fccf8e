//! Source pumps: one task per source feeding the merge engine.

use crate::consumer::EntryConsumer;
use crate::entry::LogEntry;
use crate::error::MergeError;
use crate::merge::candidate::Candidate;
use crate::merge::engine::MergeEngine;
use crate::offset::Offset;
use crate::position::SourceId;
use crate::reader::{EntrySink, LogSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// Drives one source's reader from its start offset into the engine.
pub(crate) struct SourcePump<C> {
  engine: Arc<MergeEngine<C>>,
  index: usize,
  source: LogSource,
}

impl<C: EntryConsumer + 'static> SourcePump<C> {
  pub(crate) fn new(engine: Arc<MergeEngine<C>>, index: usize, source: LogSource) -> Self {
    Self {
      engine,
      index,
      source,
    }
  }

  /// Reads until the source is exhausted, the engine stops, or the reader
  /// fails, then reports completion to the engine exactly once.
  pub(crate) async fn run(self, start: Offset) {
    let SourcePump {
      engine,
      index,
      source,
    } = self;

    let failure = if engine.is_running() {
      let mut sink = PumpSink {
        engine: Arc::clone(&engine),
        index,
        source_id: source.id,
        path: source.path.clone(),
        sequence: 0,
      };
      match source.reader.read_entries(&start, &mut sink).await {
        Ok(()) => {
          debug!(index, source_id = %source.id, produced = sink.sequence, "source pump finished");
          None
        }
        Err(e) => {
          error!(
            index,
            source_id = %source.id,
            path = %source.path,
            error = %e,
            "failed to read from source"
          );
          Some(MergeError::Source {
            index,
            source_id: source.id,
            path: source.path.clone(),
            source: e,
          })
        }
      }
    } else {
      None
    };

    engine.finished(index, failure).await;
  }
}

struct PumpSink<C> {
  engine: Arc<MergeEngine<C>>,
  index: usize,
  source_id: SourceId,
  path: String,
  sequence: u64,
}

#[async_trait]
impl<C: EntryConsumer + 'static> EntrySink for PumpSink<C> {
  async fn accept(&mut self, entry: LogEntry) -> bool {
    let candidate = Candidate::new(self.index, self.sequence, self.source_id, self.path.clone(), entry);
    self.sequence += 1;
    self.engine.offer(Some(candidate)).await
  }
}
