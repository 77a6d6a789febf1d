//! Decoded diff output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;
use crate::Seq;

/// A decoded entry. `value == None` is an explicitly absent value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub seq: Seq,
    pub key: Value,
    pub value: Option<Value>,
}

/// What kind of logical change a [`DiffEntry`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Updated,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "Added"),
            Self::Removed => write!(f, "Removed"),
            Self::Updated => write!(f, "Updated"),
        }
    }
}

/// One key's logical change going from the old snapshot to the new one.
///
/// `new_state == None` means the key was removed, `old_state == None` means
/// it was created. Both are never `None` at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub new_state: Option<Entry>,
    pub old_state: Option<Entry>,
}

impl DiffEntry {
    pub fn kind(&self) -> ChangeKind {
        match (&self.new_state, &self.old_state) {
            (Some(_), None) => ChangeKind::Added,
            (None, Some(_)) => ChangeKind::Removed,
            _ => ChangeKind::Updated,
        }
    }

    /// The decoded key, taken from whichever side is present.
    pub fn key(&self) -> Option<&Value> {
        self.new_state
            .as_ref()
            .or(self.old_state.as_ref())
            .map(|e| &e.key)
    }

    /// The same change seen from the other direction.
    pub fn swapped(self) -> Self {
        Self {
            new_state: self.old_state,
            old_state: self.new_state,
        }
    }
}
