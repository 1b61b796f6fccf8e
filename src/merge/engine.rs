//! # Merge Engine
//!
//! Coordinates one merge run: bounded per-source buffering, global ordering,
//! delivery to the consumer, and termination.
//!
//! ## Admission
//!
//! Pumps [`offer`](MergeEngine::offer) candidates concurrently. While more than
//! one source is active, a candidate is admitted only after taking a permit
//! from its source's gate, so no source can have more than
//! `buffer_per_source` candidates waiting. Once at most one source remains
//! active the gates are closed, which lifts the bound and wakes any pump still
//! waiting on one.
//!
//! ## Draining
//!
//! Whoever wins `try_lock` on the drain section becomes the sole drainer; every
//! other caller has already deposited its candidate and returns. The drainer
//! releases the smallest candidate only while every active source has at least
//! one candidate buffered, because until then an unseen source could still
//! produce something earlier. The drain section owns the offset markers and the
//! consumer, so positions are minted and entries delivered by one task at a
//! time.
//!
//! ## Run states
//!
//! `Idle → Running → (Draining | Cancelling) → Terminated`. `Draining` is the
//! tail flush after every pump finished; `Cancelling` is entered when the
//! consumer asks to stop or any failure is captured.

use crate::consumer::EntryConsumer;
use crate::entry::{FIELD_LOG_PATH, FIELD_SOURCE_ID, LogEntry};
use crate::error::MergeError;
use crate::merge::candidate::{Candidate, CandidateKey};
use crate::merge::config::MergeConfig;
use crate::merge::pump::SourcePump;
use crate::offset::Offset;
use crate::position::{ComposedPosition, PointerPart};
use crate::reader::LogSource;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a merge run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum RunState {
  /// Created, not started.
  Idle = 0,
  /// Pumps are reading and entries are being delivered.
  Running = 1,
  /// All pumps finished; flushing what is left in the buffer.
  Draining = 2,
  /// Stopped by the consumer or by a failure; no more deliveries.
  Cancelling = 3,
  /// The run is over.
  Terminated = 4,
}

impl RunState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => RunState::Idle,
      1 => RunState::Running,
      2 => RunState::Draining,
      3 => RunState::Cancelling,
      _ => RunState::Terminated,
    }
  }
}

struct Buffer {
  candidates: BTreeMap<CandidateKey, Candidate>,
  pending: Vec<usize>,
  active: Vec<bool>,
  active_count: usize,
}

impl Buffer {
  fn new(sources: usize) -> Self {
    Self {
      candidates: BTreeMap::new(),
      pending: vec![0; sources],
      active: vec![true; sources],
      active_count: sources,
    }
  }

  /// True when the smallest candidate cannot be preceded by anything an
  /// active source has yet to offer.
  fn is_drainable(&self) -> bool {
    !self.candidates.is_empty()
      && self
        .active
        .iter()
        .zip(&self.pending)
        .all(|(active, pending)| !*active || *pending > 0)
  }

  fn pop_first(&mut self) -> Option<Candidate> {
    let (_, candidate) = self.candidates.pop_first()?;
    self.pending[candidate.source_index] -= 1;
    Some(candidate)
  }
}

struct DrainSection<C> {
  markers: Vec<PointerPart>,
  consumer: C,
}

impl<C> DrainSection<C> {
  /// Advances the source's marker around the entry and stamps the composed
  /// start and end positions plus source metadata onto it.
  fn stamp(&mut self, candidate: Candidate) -> LogEntry {
    let Candidate {
      source_index,
      source_id,
      path,
      mut entry,
      ..
    } = candidate;
    let timestamp = entry.timestamp;

    if let Some(offset) = entry.start_offset.take() {
      self.markers[source_index] = PointerPart::new(source_id, path.clone(), offset);
    }
    let start = ComposedPosition::snapshot(&self.markers, timestamp);

    if let Some(offset) = entry.end_offset.take() {
      self.markers[source_index] = PointerPart::new(source_id, path.clone(), offset);
    }
    let end = ComposedPosition::snapshot(&self.markers, timestamp);

    entry.start_offset = Some(Offset::Composed(start));
    entry.end_offset = Some(Offset::Composed(end));
    entry.put(FIELD_SOURCE_ID, source_id.as_u64());
    entry.put(FIELD_LOG_PATH, path);
    entry
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state of one merge run.
///
/// An engine is created per run and is not reusable.
pub struct MergeEngine<C> {
  name: String,
  state: AtomicU8,
  gating: AtomicBool,
  gates: Vec<Semaphore>,
  buffer: Mutex<Buffer>,
  drain: AsyncMutex<DrainSection<C>>,
  cause: Mutex<Option<MergeError>>,
  delivered: AtomicU64,
}

impl<C: EntryConsumer> MergeEngine<C> {
  /// Creates an engine for `markers.len()` sources.
  ///
  /// `markers` holds each source's start position in source-index order; the
  /// offsets double as the start offsets of the pumps.
  pub fn new(config: &MergeConfig, markers: Vec<PointerPart>, consumer: C) -> Self {
    let sources = markers.len();
    Self {
      name: config.name().to_string(),
      state: AtomicU8::new(RunState::Idle as u8),
      gating: AtomicBool::new(sources > 1),
      gates: (0..sources)
        .map(|_| Semaphore::new(config.buffer_per_source))
        .collect(),
      buffer: Mutex::new(Buffer::new(sources)),
      drain: AsyncMutex::new(DrainSection { markers, consumer }),
      cause: Mutex::new(None),
      delivered: AtomicU64::new(0),
    }
  }

  /// Returns the current run state.
  pub fn state(&self) -> RunState {
    RunState::from_u8(self.state.load(Ordering::Acquire))
  }

  /// Returns true while entries may still be delivered.
  pub fn is_running(&self) -> bool {
    matches!(self.state(), RunState::Running | RunState::Draining)
  }

  /// Number of sources taking part in the run.
  pub fn source_count(&self) -> usize {
    self.gates.len()
  }

  /// Number of sources whose pump has not finished.
  pub fn active_sources(&self) -> usize {
    lock(&self.buffer).active_count
  }

  /// Number of buffered, undelivered candidates of one source.
  pub fn pending(&self, source_index: usize) -> usize {
    lock(&self.buffer).pending.get(source_index).copied().unwrap_or(0)
  }

  /// Number of entries handed to the consumer so far.
  pub fn delivered(&self) -> u64 {
    self.delivered.load(Ordering::Relaxed)
  }

  /// Moves an idle engine to `Running`.
  pub fn start(&self) {
    let _ = self.state.compare_exchange(
      RunState::Idle as u8,
      RunState::Running as u8,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
  }

  /// Stops the run, capturing `cause` if no earlier cause was captured.
  ///
  /// Closes every gate so pumps blocked on backpressure observe the stop.
  pub fn stop(&self, cause: Option<MergeError>) {
    if let Some(cause) = cause {
      let mut slot = lock(&self.cause);
      if slot.is_none() {
        *slot = Some(cause);
      } else {
        warn!(name = %self.name, error = %cause, "discarding secondary merge failure");
      }
    }
    let _ = self
      .state
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
        match RunState::from_u8(state) {
          RunState::Idle | RunState::Running | RunState::Draining => Some(RunState::Cancelling as u8),
          _ => None,
        }
      });
    self.close_gates();
  }

  fn close_gates(&self) {
    for gate in &self.gates {
      gate.close();
    }
  }

  fn lock_buffer(&self) -> MutexGuard<'_, Buffer> {
    lock(&self.buffer)
  }

  /// Offers a candidate (or just a drain attempt when `None`).
  ///
  /// Blocks on the candidate's gate while the bound applies. Returns whether
  /// the run is still going; pumps stop reading on `false`. A candidate from
  /// an unknown source index is rejected with `false`.
  pub async fn offer(&self, candidate: Option<Candidate>) -> bool {
    if let Some(candidate) = candidate {
      if !self.admit(candidate).await {
        return false;
      }
    }
    self.drain().await;
    self.is_running()
  }

  async fn admit(&self, candidate: Candidate) -> bool {
    let index = candidate.source_index;
    if index >= self.gates.len() {
      warn!(name = %self.name, index, "rejecting candidate from unknown source");
      return false;
    }
    if self.gating.load(Ordering::Acquire) {
      // A closed gate means the bound was lifted or the run stopped.
      if let Ok(permit) = self.gates[index].acquire().await {
        permit.forget();
      }
    }
    if !self.is_running() {
      return false;
    }
    let mut buffer = self.lock_buffer();
    buffer.pending[index] += 1;
    buffer.candidates.insert(candidate.key(), candidate);
    true
  }

  async fn drain(&self) {
    loop {
      let Ok(mut section) = self.drain.try_lock() else {
        return;
      };
      self.drain_locked(&mut section).await;
      drop(section);

      // Anything deposited while the holder was giving up is ours to deliver.
      let drainable = {
        let buffer = self.lock_buffer();
        buffer.is_drainable()
      };
      if !drainable || !self.is_running() {
        return;
      }
    }
  }

  async fn drain_locked(&self, section: &mut DrainSection<C>) {
    while self.is_running() {
      let candidate = {
        let mut buffer = self.lock_buffer();
        if !buffer.is_drainable() {
          break;
        }
        buffer.pop_first()
      };
      let Some(candidate) = candidate else {
        break;
      };

      // Gating only ever switches off, so a set flag means a permit was taken.
      if self.gating.load(Ordering::Acquire) {
        self.gates[candidate.source_index].add_permits(1);
      }

      let source_index = candidate.source_index;
      let entry = section.stamp(candidate);
      let delivered = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
      trace!(name = %self.name, source_index, delivered, "delivering merged entry");

      match section.consumer.consume(entry).await {
        Ok(true) => {}
        Ok(false) => {
          debug!(name = %self.name, delivered, "consumer requested stop");
          self.stop(None);
        }
        Err(e) => {
          self.stop(Some(MergeError::Consume(e)));
        }
      }
    }
  }

  /// Called exactly once per pump when it stops reading. Unknown source
  /// indices are ignored.
  pub async fn finished(&self, source_index: usize, failure: Option<MergeError>) {
    if source_index >= self.gates.len() {
      warn!(name = %self.name, index = source_index, "ignoring completion of unknown source");
      return;
    }
    if let Some(failure) = failure {
      self.stop(Some(failure));
    }

    let remaining = {
      let mut buffer = self.lock_buffer();
      if std::mem::replace(&mut buffer.active[source_index], false) {
        buffer.active_count -= 1;
      }
      buffer.active_count
    };

    if remaining <= 1 && self.gating.swap(false, Ordering::AcqRel) {
      debug!(name = %self.name, remaining, "lifting per-source buffer bound");
      self.close_gates();
    }

    self.offer(None).await;
  }

  pub(crate) fn finish(&self) -> Result<(), MergeError> {
    self
      .state
      .store(RunState::Terminated as u8, Ordering::Release);
    match lock(&self.cause).take() {
      Some(cause) => Err(cause),
      None => Ok(()),
    }
  }
}

impl<C: EntryConsumer + 'static> MergeEngine<C> {
  /// Runs the merge: one pump per source, then a final flush.
  ///
  /// `sources` must be in the same order as the markers the engine was
  /// created with. Returns the first captured failure, if any.
  pub async fn run(self: Arc<Self>, sources: Vec<LogSource>) -> Result<(), MergeError> {
    let starts: Vec<Offset> = {
      let section = self.drain.lock().await;
      section.markers.iter().map(|m| m.offset.clone()).collect()
    };
    debug_assert_eq!(starts.len(), sources.len());

    self.start();
    info!(name = %self.name, sources = sources.len(), "starting merge");

    let mut pumps = JoinSet::new();
    for (index, (source, start)) in sources.into_iter().zip(starts).enumerate() {
      pumps.spawn(SourcePump::new(Arc::clone(&self), index, source).run(start));
    }
    while let Some(joined) = pumps.join_next().await {
      if let Err(e) = joined {
        error!(name = %self.name, error = %e, "source pump did not complete");
        self.stop(Some(MergeError::Interrupted(e.to_string())));
      }
    }

    let _ = self.state.compare_exchange(
      RunState::Running as u8,
      RunState::Draining as u8,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
    self.offer(None).await;

    let result = self.finish();
    info!(
      name = %self.name,
      delivered = self.delivered(),
      failed = result.is_err(),
      "merge finished"
    );
    result
  }
}
