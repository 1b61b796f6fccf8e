use crate::offset::Offset;
use crate::position::{ComposedPosition, PointerPart, SourceId};
use chrono::{TimeZone, Utc};

fn markers() -> Vec<PointerPart> {
  vec![
    PointerPart::new(SourceId::new(1), "/var/log/a.log", Offset::sequence(4)),
    PointerPart::new(SourceId::new(2), "/var/log/b.log", Offset::Earliest),
  ]
}

#[test]
fn test_source_id_display() {
  assert_eq!(SourceId::new(42).to_string(), "42");
  assert_eq!(SourceId::new(42).as_u64(), 42);
}

#[test]
fn test_pointer_part_display() {
  let part = PointerPart::new(SourceId::new(3), "c.log", Offset::sequence(9));
  assert_eq!(part.to_string(), "3:c.log@seq:9");
}

#[test]
fn test_snapshot_is_independent_of_markers() {
  let mut markers = markers();
  let snapshot = ComposedPosition::snapshot(&markers, None);

  markers[0].offset = Offset::sequence(5);
  markers[1] = PointerPart::new(SourceId::new(2), "/var/log/b.log", Offset::sequence(1));

  assert_eq!(snapshot.parts()[0].offset, Offset::sequence(4));
  assert_eq!(snapshot.parts()[1].offset, Offset::Earliest);
}

#[test]
fn test_offset_of() {
  let position = ComposedPosition::new(markers(), None);
  assert_eq!(position.offset_of(SourceId::new(1)), Some(&Offset::sequence(4)));
  assert_eq!(position.offset_of(SourceId::new(2)), Some(&Offset::Earliest));
  assert_eq!(position.offset_of(SourceId::new(7)), None);
}

#[test]
fn test_len_and_empty() {
  let position = ComposedPosition::new(markers(), None);
  assert_eq!(position.len(), 2);
  assert!(!position.is_empty());
  assert!(ComposedPosition::new(Vec::new(), None).is_empty());
  assert_eq!(position.into_parts(), markers());
}

#[test]
fn test_display() {
  let position = ComposedPosition::new(markers(), None);
  assert_eq!(
    position.to_string(),
    "[1:/var/log/a.log@seq:4, 2:/var/log/b.log@earliest]"
  );
}

#[test]
fn test_serde_roundtrip_with_nested_position() {
  let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
  let inner = ComposedPosition::new(markers(), Some(ts));
  let outer = ComposedPosition::new(
    vec![
      PointerPart::new(SourceId::new(10), "inner", Offset::Composed(inner.clone())),
      PointerPart::new(SourceId::new(11), "c.log", Offset::custom("block-7")),
    ],
    Some(ts),
  );

  let json = serde_json::to_string(&outer).unwrap();
  let back: ComposedPosition = serde_json::from_str(&json).unwrap();

  assert_eq!(back, outer);
  assert_eq!(back.timestamp(), Some(ts));
  assert_eq!(back.parts()[0].offset.as_composed(), Some(&inner));
}
