//! Per-source read offsets.
//!
//! An [`Offset`] is opaque to the merge: readers mint them, the merge engine
//! only copies them into offset markers and hands them back to the same reader
//! when a run resumes.

use crate::position::ComposedPosition;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A read position inside one log source.
///
/// Offsets can be sequence numbers (line or byte positions), custom reader
/// tokens, or a [`ComposedPosition`] when the source is itself a composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Offset {
  /// Represents the beginning of a source.
  #[default]
  Earliest,
  /// A sequence number offset.
  Sequence(u64),
  /// A custom string offset.
  Custom(String),
  /// A multi-source position, used when the source is a composed log.
  Composed(ComposedPosition),
}

impl Display for Offset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Offset::Earliest => write!(f, "earliest"),
      Offset::Sequence(n) => write!(f, "seq:{}", n),
      Offset::Custom(s) => write!(f, "custom:{}", s),
      Offset::Composed(p) => write!(f, "composed:{}", p),
    }
  }
}

impl Offset {
  /// Creates a sequence offset.
  pub fn sequence(n: u64) -> Self {
    Offset::Sequence(n)
  }

  /// Creates a custom string offset.
  pub fn custom(s: impl Into<String>) -> Self {
    Offset::Custom(s.into())
  }

  /// Returns true if this is the earliest offset.
  pub fn is_earliest(&self) -> bool {
    matches!(self, Offset::Earliest)
  }

  /// Returns the composed position if this offset is one.
  pub fn as_composed(&self) -> Option<&ComposedPosition> {
    match self {
      Offset::Composed(p) => Some(p),
      _ => None,
    }
  }
}

impl From<ComposedPosition> for Offset {
  fn from(position: ComposedPosition) -> Self {
    Offset::Composed(position)
  }
}
