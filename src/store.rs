//! # Resume Checkpoints
//!
//! A merged log is resumed by starting a new run at the end position of the
//! last entry the consumer handled. This module keeps that position, as a
//! [`Checkpoint`], across process restarts.
//!
//! ## Overview
//!
//! - **PositionStore**: where checkpoints live ([`InMemoryPositionStore`],
//!   [`FilePositionStore`])
//! - **PositionTracker**: follows one merged log, commits its progress per
//!   [`CommitStrategy`], and turns the stored checkpoint back into a start
//!   offset for a given [`ComposedReader`]
//!
//! A checkpoint only makes sense for the composition that produced it. The
//! tracker checks the stored position against the reader's sources before
//! resuming and fails with [`StoreError::Incompatible`] when they differ, rather
//! than quietly starting over.

use crate::composition::ComposedReader;
use crate::error::{StoreError, StoreResult};
use crate::offset::Offset;
use crate::position::ComposedPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Version written to and expected in checkpoint files.
pub const CHECKPOINT_FILE_VERSION: u32 = 1;

/// When recorded positions are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommitStrategy {
  /// Commit after each handled entry.
  #[default]
  Auto,
  /// Commit every n handled entries.
  Periodic(u64),
  /// Only commit on [`PositionTracker::flush`].
  Manual,
}

/// Persisted progress of one merged log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
  /// End position of the last handled entry.
  pub position: ComposedPosition,
  /// Entries handled under this name, summed over all runs.
  pub delivered: u64,
  /// When the checkpoint was written.
  pub saved_at: DateTime<Utc>,
}

/// Storage backend for checkpoints, keyed by merged-log name.
pub trait PositionStore: Send + Sync + std::fmt::Debug {
  /// Loads the checkpoint stored under `name`.
  fn load(&self, name: &str) -> StoreResult<Option<Checkpoint>>;

  /// Stores `checkpoint` under `name`, replacing any earlier one.
  fn save(&self, name: &str, checkpoint: &Checkpoint) -> StoreResult<()>;

  /// Forgets the checkpoint stored under `name`.
  fn remove(&self, name: &str) -> StoreResult<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Checkpoints held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPositionStore {
  checkpoints: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl InMemoryPositionStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }
}

impl PositionStore for InMemoryPositionStore {
  fn load(&self, name: &str) -> StoreResult<Option<Checkpoint>> {
    Ok(lock(&self.checkpoints).get(name).cloned())
  }

  fn save(&self, name: &str, checkpoint: &Checkpoint) -> StoreResult<()> {
    lock(&self.checkpoints).insert(name.to_string(), checkpoint.clone());
    Ok(())
  }

  fn remove(&self, name: &str) -> StoreResult<()> {
    lock(&self.checkpoints).remove(name);
    Ok(())
  }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
  version: u32,
  checkpoints: BTreeMap<String, Checkpoint>,
}

/// Checkpoints kept in one versioned JSON file.
///
/// Every change rewrites a sibling temporary file and renames it over the
/// original, so a crash mid-write leaves the previous checkpoints intact.
#[derive(Debug)]
pub struct FilePositionStore {
  path: PathBuf,
  checkpoints: Mutex<BTreeMap<String, Checkpoint>>,
}

impl FilePositionStore {
  /// Opens the store at `path`, loading its checkpoints if the file exists.
  pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
    let path = path.as_ref().to_path_buf();
    let checkpoints = match fs::read_to_string(&path) {
      Ok(data) if data.trim().is_empty() => BTreeMap::new(),
      Ok(data) => {
        let file: CheckpointFile =
          serde_json::from_str(&data).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if file.version != CHECKPOINT_FILE_VERSION {
          return Err(StoreError::Serialization(format!(
            "unsupported checkpoint file version {} in {}",
            file.version,
            path.display()
          )));
        }
        file.checkpoints
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    debug!(path = %path.display(), checkpoints = checkpoints.len(), "opened checkpoint file");

    Ok(Self {
      path,
      checkpoints: Mutex::new(checkpoints),
    })
  }

  /// Returns the path of the checkpoint file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn write(&self, checkpoints: &BTreeMap<String, Checkpoint>) -> StoreResult<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let file = CheckpointFile {
      version: CHECKPOINT_FILE_VERSION,
      checkpoints: checkpoints.clone(),
    };
    let data =
      serde_json::to_string_pretty(&file).map_err(|e| StoreError::Serialization(e.to_string()))?;

    let mut staging = self.path.clone().into_os_string();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    fs::write(&staging, data)?;
    fs::rename(&staging, &self.path)?;
    Ok(())
  }
}

impl PositionStore for FilePositionStore {
  fn load(&self, name: &str) -> StoreResult<Option<Checkpoint>> {
    Ok(lock(&self.checkpoints).get(name).cloned())
  }

  fn save(&self, name: &str, checkpoint: &Checkpoint) -> StoreResult<()> {
    let mut checkpoints = lock(&self.checkpoints);
    checkpoints.insert(name.to_string(), checkpoint.clone());
    self.write(&checkpoints)
  }

  fn remove(&self, name: &str) -> StoreResult<()> {
    let mut checkpoints = lock(&self.checkpoints);
    if checkpoints.remove(name).is_some() {
      self.write(&checkpoints)?;
    }
    Ok(())
  }
}

#[derive(Debug, Default)]
struct Progress {
  latest: Option<ComposedPosition>,
  delivered: u64,
  uncommitted: u64,
}

/// Tracks the progress of one merged log and commits it to a store.
#[derive(Debug)]
pub struct PositionTracker {
  name: String,
  store: Arc<dyn PositionStore>,
  strategy: CommitStrategy,
  progress: Mutex<Progress>,
}

impl PositionTracker {
  /// Creates a tracker for the merged log `name` that commits every entry.
  pub fn new(store: Arc<dyn PositionStore>, name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      store,
      strategy: CommitStrategy::default(),
      progress: Mutex::new(Progress::default()),
    }
  }

  /// Sets the commit strategy.
  #[must_use]
  pub fn with_strategy(mut self, strategy: CommitStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  /// Returns the merged-log name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the commit strategy.
  pub fn strategy(&self) -> CommitStrategy {
    self.strategy
  }

  /// Returns the stored checkpoint, if any.
  pub fn checkpoint(&self) -> StoreResult<Option<Checkpoint>> {
    self.store.load(&self.name)
  }

  /// Returns the offset `reader` should start from.
  ///
  /// `Earliest` when nothing was stored. A stored position must cover exactly
  /// the reader's sources, in order, or this fails with
  /// [`StoreError::Incompatible`]. Resuming continues the delivered count of
  /// the checkpoint.
  pub fn resume_offset(&self, reader: &ComposedReader) -> StoreResult<Offset> {
    let Some(checkpoint) = self.store.load(&self.name)? else {
      info!(name = %self.name, "no checkpoint, starting from the beginning");
      return Ok(Offset::Earliest);
    };

    let offset = Offset::Composed(checkpoint.position);
    reader
      .start_markers(&offset)
      .map_err(|e| StoreError::Incompatible {
        name: self.name.clone(),
        reason: e.to_string(),
      })?;

    let mut progress = lock(&self.progress);
    progress.delivered = checkpoint.delivered;
    progress.uncommitted = 0;
    info!(name = %self.name, delivered = checkpoint.delivered, "resuming from checkpoint");
    Ok(offset)
  }

  /// Records that the entry ending at `position` was handled, committing per
  /// the strategy.
  pub fn record(&self, position: ComposedPosition) -> StoreResult<()> {
    let mut progress = lock(&self.progress);
    progress.latest = Some(position);
    progress.delivered += 1;
    progress.uncommitted += 1;

    let due = match self.strategy {
      CommitStrategy::Auto => true,
      CommitStrategy::Periodic(every) => progress.uncommitted >= every.max(1),
      CommitStrategy::Manual => false,
    };
    if due {
      self.commit(&mut progress)?;
    }
    Ok(())
  }

  /// Commits the latest recorded position if it has not been committed yet.
  pub fn flush(&self) -> StoreResult<()> {
    let mut progress = lock(&self.progress);
    if progress.uncommitted > 0 {
      self.commit(&mut progress)?;
    }
    Ok(())
  }

  fn commit(&self, progress: &mut Progress) -> StoreResult<()> {
    let Some(position) = progress.latest.clone() else {
      return Ok(());
    };
    let checkpoint = Checkpoint {
      position,
      delivered: progress.delivered,
      saved_at: Utc::now(),
    };
    self.store.save(&self.name, &checkpoint)?;
    progress.uncommitted = 0;
    Ok(())
  }

  /// Entries handled so far, including those of resumed runs.
  pub fn delivered(&self) -> u64 {
    lock(&self.progress).delivered
  }

  /// Entries recorded since the last commit.
  pub fn uncommitted(&self) -> u64 {
    lock(&self.progress).uncommitted
  }

  /// Forgets the stored checkpoint and all recorded progress.
  pub fn reset(&self) -> StoreResult<()> {
    self.store.remove(&self.name)?;
    *lock(&self.progress) = Progress::default();
    Ok(())
  }
}
