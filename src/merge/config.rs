//! Merge configuration.

use crate::error::MergeError;
use tokio::sync::Semaphore;

/// Default number of unconsumed candidates one source may have buffered.
pub const DEFAULT_BUFFER_PER_SOURCE: usize = 10;

/// Default capacity of the channel behind a merged stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 16;

/// Configuration of a merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
  /// Maximum buffered-not-delivered candidates per source while more than one
  /// source is active.
  pub buffer_per_source: usize,
  /// Capacity of the channel used by [`merge_stream`](crate::ComposedReader::merge_stream).
  pub stream_capacity: usize,
  /// Name used in log output.
  pub name: Option<String>,
}

impl Default for MergeConfig {
  fn default() -> Self {
    Self {
      buffer_per_source: DEFAULT_BUFFER_PER_SOURCE,
      stream_capacity: DEFAULT_STREAM_CAPACITY,
      name: None,
    }
  }
}

impl MergeConfig {
  /// Sets the per-source buffer bound.
  #[must_use]
  pub fn with_buffer_per_source(mut self, n: usize) -> Self {
    self.buffer_per_source = n;
    self
  }

  /// Sets the merged stream channel capacity.
  #[must_use]
  pub fn with_stream_capacity(mut self, n: usize) -> Self {
    self.stream_capacity = n;
    self
  }

  /// Sets the name.
  #[must_use]
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Returns the name, or `"composed"` when unset.
  pub fn name(&self) -> &str {
    self.name.as_deref().unwrap_or("composed")
  }

  /// Rejects zero-sized buffers and bounds a per-source gate cannot hold.
  pub fn validate(&self) -> Result<(), MergeError> {
    if self.buffer_per_source == 0 {
      return Err(MergeError::Config("buffer_per_source must be at least 1".to_string()));
    }
    if self.buffer_per_source > Semaphore::MAX_PERMITS {
      return Err(MergeError::Config(format!(
        "buffer_per_source must be at most {}",
        Semaphore::MAX_PERMITS
      )));
    }
    if self.stream_capacity == 0 {
      return Err(MergeError::Config("stream_capacity must be at least 1".to_string()));
    }
    Ok(())
  }
}
