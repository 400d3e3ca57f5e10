//! Reversible editing history.
//!
//! Every mutation through the edit engine records a `HistoryEntry` grouping
//! one or more `ChangeRecord`s. Undo and redo replay entire entries; a batch
//! paste undoes in one step.

use chrono::{DateTime, Utc};
use rostergrid_model::{RowId, Validity, Value};

/// One atomic cell mutation, with enough state to replay in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub row_id: RowId,
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
    pub old_text: String,
    pub new_text: String,
    pub old_validity: Validity,
    pub new_validity: Validity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Single,
    Batch,
}

/// One undoable unit. Undo/redo always replays the whole entry, never part.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub kind: EntryKind,
    pub description: String,
    pub at: DateTime<Utc>,
    pub changes: Vec<ChangeRecord>,
}

impl HistoryEntry {
    pub fn single(description: impl Into<String>, changes: Vec<ChangeRecord>) -> Self {
        Self {
            kind: EntryKind::Single,
            description: description.into(),
            at: Utc::now(),
            changes,
        }
    }

    pub fn batch(description: impl Into<String>, changes: Vec<ChangeRecord>) -> Self {
        Self {
            kind: EntryKind::Batch,
            description: description.into(),
            at: Utc::now(),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Bounded undo/redo stacks with linear-history semantics: recording a new
/// entry clears the redo stack, and the oldest entry is evicted once the
/// capacity is exceeded.
#[derive(Debug)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            capacity,
        }
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.redo.clear();
        self.undo.push(entry);
        if self.undo.len() > self.capacity {
            self.undo.remove(0);
        }
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// Park an undone entry on the redo stack.
    pub fn push_undone(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Return a redone entry to the undo stack without touching redo.
    pub fn push_redone(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
