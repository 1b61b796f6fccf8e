//! K-way merge of concurrently read sources.
//!
//! The [`MergeEngine`] interleaves candidates offered by one
//! pump per source into a single `(timestamp, source index)` ordered stream
//! and stamps every delivered entry with composed start and end positions.

/// Buffered candidates and the global ordering key.
pub mod candidate;
/// Merge configuration.
pub mod config;
/// The merge engine.
pub mod engine;
mod pump;

pub use candidate::{Candidate, CandidateKey};
pub use config::{DEFAULT_BUFFER_PER_SOURCE, DEFAULT_STREAM_CAPACITY, MergeConfig};
pub use engine::{MergeEngine, RunState};
