use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Validation state of a cell. The failure reason exists only when invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Validity {
    Valid,
    /// An asynchronous check is in flight for the current value.
    Validating,
    Invalid { reason: String },
}

impl Validity {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Validity::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Validity::Invalid { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Validity::Invalid { reason } => Some(reason),
            _ => None,
        }
    }
}

/// The smallest editable unit: display text, canonical value, and state.
///
/// "Edited" is never stored — `is_edited()` compares against `original`, so a
/// cell edited back to its original value stops reading as edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: Value,
    /// Display text as last rendered or typed.
    pub text: String,
    /// Snapshot at load or last successful save.
    pub original: Value,
    pub validity: Validity,
    pub has_conflict: bool,
    /// Monotonic edit counter. Guards against stale validation results.
    pub edit_seq: u64,
}

impl Cell {
    /// Cell loaded from a persisted record: `original == value`, nothing edited.
    pub fn loaded(value: Value) -> Self {
        let text = value.display();
        Self {
            original: value.clone(),
            value,
            text,
            validity: Validity::Valid,
            has_conflict: false,
            edit_seq: 0,
        }
    }

    /// Cell on a draft row: empty original, so any supplied value reads as edited.
    pub fn draft(value: Value) -> Self {
        let text = value.display();
        Self {
            original: Value::Empty,
            value,
            text,
            validity: Validity::Valid,
            has_conflict: false,
            edit_seq: 0,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.value != self.original
    }

    /// Reset the original snapshot to the current value (after a successful save).
    pub fn mark_saved(&mut self) {
        self.original = self.value.clone();
        self.validity = Validity::Valid;
    }
}
