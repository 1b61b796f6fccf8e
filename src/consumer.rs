//! # Consumers
//!
//! A consumer receives merged entries in global order. Its return value is the
//! continue/cancel signal of the run: `Ok(true)` keeps merging, `Ok(false)`
//! stops the run cleanly, and `Err` aborts it with [`MergeError::Consume`].
//!
//! Only one drainer delivers at a time, so consumers need not be reentrant.
//!
//! ## Provided consumers
//!
//! - Any `FnMut(LogEntry) -> Result<bool, BoxError>` closure
//! - [`ChannelConsumer`]: forwards into a bounded `tokio::sync::mpsc` channel
//! - [`TrackingConsumer`]: records end positions in a [`PositionTracker`]

use crate::entry::LogEntry;
use crate::error::{BoxError, MergeError};
use crate::store::PositionTracker;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives the merged, time-ordered entries of a run.
#[async_trait]
pub trait EntryConsumer: Send {
  /// Handles one merged entry. Returns whether the run should continue.
  async fn consume(&mut self, entry: LogEntry) -> Result<bool, BoxError>;
}

#[async_trait]
impl<F> EntryConsumer for F
where
  F: FnMut(LogEntry) -> Result<bool, BoxError> + Send,
{
  async fn consume(&mut self, entry: LogEntry) -> Result<bool, BoxError> {
    (*self)(entry)
  }
}

/// Forwards merged entries into a channel.
///
/// A closed receiver is treated as a request to stop, not as a failure.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
  sender: mpsc::Sender<Result<LogEntry, MergeError>>,
}

impl ChannelConsumer {
  /// Creates a consumer sending into `sender`.
  pub fn new(sender: mpsc::Sender<Result<LogEntry, MergeError>>) -> Self {
    Self { sender }
  }
}

#[async_trait]
impl EntryConsumer for ChannelConsumer {
  async fn consume(&mut self, entry: LogEntry) -> Result<bool, BoxError> {
    Ok(self.sender.send(Ok(entry)).await.is_ok())
  }
}

/// Wraps a consumer and records every delivered entry's end position.
///
/// The position is recorded after the inner consumer accepted the entry, so a
/// committed position never runs ahead of what the consumer has handled. A
/// failing commit fails the run like a consumer error.
pub struct TrackingConsumer<C> {
  inner: C,
  tracker: Arc<PositionTracker>,
}

impl<C: EntryConsumer> TrackingConsumer<C> {
  /// Creates a wrapper recording into `tracker`.
  pub fn new(inner: C, tracker: Arc<PositionTracker>) -> Self {
    Self { inner, tracker }
  }
}

#[async_trait]
impl<C: EntryConsumer> EntryConsumer for TrackingConsumer<C> {
  async fn consume(&mut self, entry: LogEntry) -> Result<bool, BoxError> {
    let end = entry.end_offset.as_ref().and_then(|o| o.as_composed()).cloned();
    let keep_going = self.inner.consume(entry).await?;
    if let Some(position) = end {
      self.tracker.record(position)?;
    }
    Ok(keep_going)
  }
}
