use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::Cell;
use crate::value::Value;

/// Identity of a row: a persisted record id, or a token for unsaved drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowId {
    Persisted(i64),
    Draft(Uuid),
}

impl RowId {
    /// Fresh draft token.
    pub fn draft() -> Self {
        RowId::Draft(Uuid::new_v4())
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, RowId::Draft(_))
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Persisted(id) => write!(f, "#{id}"),
            RowId::Draft(token) => write!(f, "draft-{token}"),
        }
    }
}

/// Version marker captured at load time, used to detect concurrent edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyToken {
    pub version: i64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl ConcurrencyToken {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            modified_at: None,
        }
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }
}

/// What the storage collaborator knows about one persisted record: its
/// identifier, its concurrency token, and canonical field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub id: i64,
    pub token: ConcurrencyToken,
    pub values: FxHashMap<String, Value>,
}

impl RecordSnapshot {
    pub fn new(id: i64, token: ConcurrencyToken) -> Self {
        Self {
            id,
            token,
            values: FxHashMap::default(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.values.get(field).unwrap_or(&EMPTY)
    }
}

/// One record's worth of cells, persisted or draft.
///
/// `has_changes` and `has_errors` are pure functions of the cells, cached
/// here and recomputed by `refresh_flags()` after every cell mutation.
/// Field iteration order comes from the schema wherever order matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    cells: FxHashMap<String, Cell>,
    pub is_selected: bool,
    /// Present only for persisted rows; captured at load time.
    pub token: Option<ConcurrencyToken>,
    has_changes: bool,
    has_errors: bool,
}

impl Row {
    pub fn new(id: RowId, cells: FxHashMap<String, Cell>, token: Option<ConcurrencyToken>) -> Self {
        let mut row = Self {
            id,
            cells,
            is_selected: false,
            token,
            has_changes: false,
            has_errors: false,
        };
        row.refresh_flags();
        row
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_draft()
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn cell(&self, field: &str) -> Option<&Cell> {
        self.cells.get(field)
    }

    pub fn cell_mut(&mut self, field: &str) -> Option<&mut Cell> {
        self.cells.get_mut(field)
    }

    /// Recompute the cached dirty/error flags by scanning all cells.
    pub fn refresh_flags(&mut self) {
        self.has_changes = self.cells.values().any(|c| c.is_edited());
        self.has_errors = self.cells.values().any(|c| c.validity.is_invalid());
    }
}
