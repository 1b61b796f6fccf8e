use crate::composition::ComposedReader;
use crate::error::StoreError;
use crate::offset::Offset;
use crate::position::{ComposedPosition, PointerPart, SourceId};
use crate::reader::{LogSource, VecReader};
use crate::store::{
  CHECKPOINT_FILE_VERSION, Checkpoint, CommitStrategy, FilePositionStore, InMemoryPositionStore,
  PositionStore, PositionTracker,
};
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

fn position(a: u64, b: u64) -> ComposedPosition {
  ComposedPosition::new(
    vec![
      PointerPart::new(SourceId::new(1), "a.log", Offset::sequence(a)),
      PointerPart::new(SourceId::new(2), "b.log", Offset::sequence(b)),
    ],
    None,
  )
}

fn checkpoint(a: u64, b: u64, delivered: u64) -> Checkpoint {
  Checkpoint {
    position: position(a, b),
    delivered,
    saved_at: Utc::now(),
  }
}

fn reader(ids: &[u64]) -> ComposedReader {
  ComposedReader::new(
    ids
      .iter()
      .map(|id| {
        LogSource::new(
          SourceId::new(*id),
          format!("{}.log", id),
          Arc::new(VecReader::default()),
        )
      })
      .collect(),
  )
}

fn tracker(store: &InMemoryPositionStore, strategy: CommitStrategy) -> PositionTracker {
  PositionTracker::new(Arc::new(store.clone()), "merged").with_strategy(strategy)
}

// ============================================================================
// Stores
// ============================================================================

#[test]
fn test_in_memory_store_save_load_remove() {
  let store = InMemoryPositionStore::new();
  assert_eq!(store.load("merged").unwrap(), None);

  let saved = checkpoint(1, 0, 1);
  store.save("merged", &saved).unwrap();
  assert_eq!(store.load("merged").unwrap(), Some(saved));

  store.remove("merged").unwrap();
  assert_eq!(store.load("merged").unwrap(), None);
}

#[test]
fn test_in_memory_store_clones_share_state() {
  let store = InMemoryPositionStore::new();
  let clone = store.clone();
  store.save("merged", &checkpoint(3, 4, 7)).unwrap();
  assert_eq!(clone.load("merged").unwrap().unwrap().delivered, 7);
}

#[test]
fn test_file_store_survives_reopen() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("state").join("checkpoints.json");

  let saved = checkpoint(7, 3, 10);
  {
    let store = FilePositionStore::new(&path).unwrap();
    assert!(!store.path().exists());
    store.save("web", &saved).unwrap();
    store.save("db", &checkpoint(1, 1, 2)).unwrap();
  }

  let reopened = FilePositionStore::new(&path).unwrap();
  assert_eq!(reopened.load("web").unwrap(), Some(saved));
  assert_eq!(reopened.load("db").unwrap().unwrap().delivered, 2);
  assert!(!dir.path().join("state").join("checkpoints.json.tmp").exists());
}

#[test]
fn test_file_store_writes_version() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("checkpoints.json");
  FilePositionStore::new(&path)
    .unwrap()
    .save("merged", &checkpoint(1, 2, 3))
    .unwrap();

  let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
  assert_eq!(raw["version"], serde_json::json!(CHECKPOINT_FILE_VERSION));
  assert!(raw["checkpoints"]["merged"]["position"].is_object());
}

#[test]
fn test_file_store_persists_nested_positions() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("checkpoints.json");
  let nested = Checkpoint {
    position: ComposedPosition::new(
      vec![
        PointerPart::new(SourceId::new(9), "inner", Offset::Composed(position(1, 2))),
        PointerPart::new(SourceId::new(3), "c.log", Offset::Earliest),
      ],
      None,
    ),
    delivered: 4,
    saved_at: Utc::now(),
  };

  FilePositionStore::new(&path).unwrap().save("outer", &nested).unwrap();
  let reopened = FilePositionStore::new(&path).unwrap();
  assert_eq!(reopened.load("outer").unwrap(), Some(nested));
}

#[test]
fn test_file_store_remove_persists() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("checkpoints.json");
  let store = FilePositionStore::new(&path).unwrap();
  store.save("one", &checkpoint(1, 1, 1)).unwrap();
  store.save("two", &checkpoint(2, 2, 2)).unwrap();
  store.remove("one").unwrap();
  store.remove("never-saved").unwrap();

  let reopened = FilePositionStore::new(&path).unwrap();
  assert_eq!(reopened.load("one").unwrap(), None);
  assert!(reopened.load("two").unwrap().is_some());
}

#[test]
fn test_file_store_empty_file() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("checkpoints.json");
  std::fs::write(&path, "  \n").unwrap();
  let store = FilePositionStore::new(&path).unwrap();
  assert_eq!(store.load("merged").unwrap(), None);
}

#[test]
fn test_file_store_rejects_corrupt_or_foreign_files() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("checkpoints.json");

  std::fs::write(&path, "{ not json").unwrap();
  assert!(matches!(
    FilePositionStore::new(&path),
    Err(StoreError::Serialization(_))
  ));

  std::fs::write(&path, r#"{"version": 99, "checkpoints": {}}"#).unwrap();
  assert!(matches!(
    FilePositionStore::new(&path),
    Err(StoreError::Serialization(ref msg)) if msg.contains("99")
  ));
}

// ============================================================================
// PositionTracker
// ============================================================================

#[test]
fn test_tracker_auto_commits_every_record() {
  let store = InMemoryPositionStore::new();
  let tracker = tracker(&store, CommitStrategy::Auto);
  assert_eq!(tracker.strategy(), CommitStrategy::Auto);
  assert_eq!(tracker.name(), "merged");

  tracker.record(position(1, 0)).unwrap();
  tracker.record(position(1, 1)).unwrap();

  let stored = store.load("merged").unwrap().unwrap();
  assert_eq!(stored.position, position(1, 1));
  assert_eq!(stored.delivered, 2);
  assert_eq!(tracker.uncommitted(), 0);
}

#[test]
fn test_tracker_periodic_commits_on_interval() {
  let store = InMemoryPositionStore::new();
  let tracker = tracker(&store, CommitStrategy::Periodic(3));

  tracker.record(position(1, 0)).unwrap();
  tracker.record(position(2, 0)).unwrap();
  assert_eq!(store.load("merged").unwrap(), None);
  assert_eq!(tracker.uncommitted(), 2);

  tracker.record(position(3, 0)).unwrap();
  assert_eq!(store.load("merged").unwrap().unwrap().position, position(3, 0));

  tracker.record(position(4, 0)).unwrap();
  assert_eq!(store.load("merged").unwrap().unwrap().position, position(3, 0));

  tracker.flush().unwrap();
  let stored = store.load("merged").unwrap().unwrap();
  assert_eq!(stored.position, position(4, 0));
  assert_eq!(stored.delivered, 4);
}

#[test]
fn test_tracker_manual_commits_on_flush_only() {
  let store = InMemoryPositionStore::new();
  let tracker = tracker(&store, CommitStrategy::Manual);

  tracker.flush().unwrap();
  assert_eq!(store.load("merged").unwrap(), None);

  tracker.record(position(5, 5)).unwrap();
  assert_eq!(store.load("merged").unwrap(), None);
  tracker.flush().unwrap();
  assert_eq!(tracker.checkpoint().unwrap().unwrap().position, position(5, 5));
}

#[test]
fn test_tracker_resumes_from_earliest_without_checkpoint() {
  let tracker = tracker(&InMemoryPositionStore::new(), CommitStrategy::Auto);
  assert_eq!(tracker.resume_offset(&reader(&[1, 2])).unwrap(), Offset::Earliest);
}

#[test]
fn test_tracker_resume_continues_delivered_count() {
  let store = InMemoryPositionStore::new();
  store.save("merged", &checkpoint(4, 2, 6)).unwrap();

  let tracker = tracker(&store, CommitStrategy::Auto);
  let offset = tracker.resume_offset(&reader(&[1, 2])).unwrap();
  assert_eq!(offset, Offset::Composed(position(4, 2)));
  assert_eq!(tracker.delivered(), 6);

  tracker.record(position(5, 2)).unwrap();
  assert_eq!(store.load("merged").unwrap().unwrap().delivered, 7);
}

#[test]
fn test_tracker_rejects_checkpoint_of_other_composition() {
  let store = InMemoryPositionStore::new();
  store.save("merged", &checkpoint(4, 2, 6)).unwrap();
  let tracker = tracker(&store, CommitStrategy::Auto);

  for ids in [&[1u64, 2, 3][..], &[2, 1][..], &[1][..]] {
    match tracker.resume_offset(&reader(ids)) {
      Err(StoreError::Incompatible { name, .. }) => assert_eq!(name, "merged"),
      other => panic!("expected incompatible checkpoint for {:?}, got {:?}", ids, other),
    }
  }
}

#[test]
fn test_tracker_reset() {
  let store = InMemoryPositionStore::new();
  let tracker = tracker(&store, CommitStrategy::Auto);
  tracker.record(position(1, 1)).unwrap();

  tracker.reset().unwrap();
  assert_eq!(tracker.checkpoint().unwrap(), None);
  assert_eq!(tracker.delivered(), 0);
  assert_eq!(tracker.resume_offset(&reader(&[1, 2])).unwrap(), Offset::Earliest);
}
