//! Save payload assembly and result application.
//!
//! The transport is a collaborator: the engine assembles what to write
//! (`prepare_save`), the collaborator performs the write, and the engine
//! applies the outcome (`apply_save_success` / `apply_save_failure`).
//! Partial success is a first-class outcome — per-row statuses, and a row
//! with skipped conflicted fields stays in the working set.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use rostergrid_model::{CellKind, ConcurrencyToken, RecordSnapshot, RowId, Validity, Value};

use crate::editor::Editor;

/// What gets written for one row: the identifier, the concurrency token, and
/// only the fields whose cells are edited, conflict-free, and not invalid,
/// in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavePayload {
    pub row_id: RowId,
    pub token: Option<ConcurrencyToken>,
    pub fields: Vec<(String, Value)>,
}

/// Payload plus the conflicted fields excluded from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSave {
    pub payload: SavePayload,
    pub skipped: Vec<String>,
}

/// One field the collaborator rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Successful write: the persisted identifier, the new concurrency token,
/// and canonical field values as stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveSuccess {
    pub id: i64,
    pub token: ConcurrencyToken,
    pub values: FxHashMap<String, Value>,
}

/// Per-row outcome of a batch save.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSaveStatus {
    Saved,
    /// Saved except the named conflicted fields, which were skipped.
    SavedWithSkippedFields { skipped: Vec<String> },
    Failed { errors: Vec<FieldError> },
}

impl Editor {
    /// Run conflict detection against the live record (when one exists),
    /// then assemble the payload. Drafts have no live counterpart.
    pub fn prepare_save(
        &mut self,
        row_id: RowId,
        live: Option<&RecordSnapshot>,
    ) -> Option<PreparedSave> {
        let skipped = match live {
            Some(live) => self.detect_conflicts(row_id, live).conflicted_fields,
            None => Vec::new(),
        };
        let payload = self.build_save_payload(row_id)?;
        Some(PreparedSave { payload, skipped })
    }

    /// Only edited, conflict-free, valid cells make the payload. A cell
    /// failing a local rule blocks the save of that field alone; derived
    /// columns are recomputed by storage's own projection and never written.
    pub fn build_save_payload(&self, row_id: RowId) -> Option<SavePayload> {
        let Some(row) = self.row(row_id) else {
            log::warn!("save skipped: row {row_id} is not in the working set");
            return None;
        };
        let mut fields = Vec::new();
        for column in self.schema.columns() {
            if column.kind == CellKind::Derived {
                continue;
            }
            let Some(cell) = row.cell(&column.name) else {
                continue;
            };
            if cell.is_edited() && !cell.has_conflict && !cell.validity.is_invalid() {
                fields.push((column.name.clone(), cell.value.clone()));
            }
        }
        Some(SavePayload {
            row_id,
            token: row.token.clone(),
            fields,
        })
    }

    /// Apply a successful write: the draft (if any) becomes persisted, every
    /// saved cell's original resets to its canonical post-save value, and the
    /// row drops out of the dirty set. Cells still flagged as conflicted were
    /// skipped by the write and keep their pending state for the operator.
    pub fn apply_save_success(&mut self, row_id: RowId, success: SaveSuccess) -> Option<RowSaveStatus> {
        let columns = self.schema.columns().to_vec();

        let row = match self.row_mut(row_id) {
            Some(row) => row,
            None => {
                log::warn!("save result dropped: row {row_id} is not in the working set");
                return None;
            }
        };
        row.id = RowId::Persisted(success.id);
        row.token = Some(success.token.clone());

        let mut skipped = Vec::new();
        for column in &columns {
            if column.kind == CellKind::Derived {
                continue;
            }
            let Some(cell) = row.cell_mut(&column.name) else {
                continue;
            };
            if cell.has_conflict {
                // Skipped by the write; the edit (if any) stays pending.
                skipped.push(column.name.clone());
                continue;
            }
            if cell.validity.is_invalid() {
                // Not written; the edit stays pending with its reason.
                continue;
            }
            if let Some(canonical) = success.values.get(&column.name) {
                cell.value = canonical.clone();
                cell.text = column.format_value(canonical);
            }
            cell.mark_saved();
            cell.edit_seq += 1;
        }

        for column in &columns {
            let Some(recipe) = &column.derived else {
                continue;
            };
            let composed =
                recipe.compose(|f| row.cell(f).map(|c| c.text.clone()).unwrap_or_default());
            let Some(cell) = row.cell_mut(&column.name) else {
                continue;
            };
            cell.value = if composed.is_empty() {
                Value::Empty
            } else {
                Value::Text(composed.clone())
            };
            cell.text = composed;
            cell.mark_saved();
            cell.edit_seq += 1;
        }

        row.refresh_flags();
        self.refresh_dirty();

        if skipped.is_empty() {
            Some(RowSaveStatus::Saved)
        } else {
            self.set_status(format!(
                "Row {} saved; skipped conflicted fields: {}",
                success.id,
                skipped.join(", ")
            ));
            Some(RowSaveStatus::SavedWithSkippedFields { skipped })
        }
    }

    /// Apply a rejected write: each named cell goes invalid with the
    /// collaborator's reason; the row stays dirty. Sibling rows in the same
    /// batch are unaffected.
    pub fn apply_save_failure(
        &mut self,
        row_id: RowId,
        errors: Vec<FieldError>,
    ) -> Option<RowSaveStatus> {
        let Some(row) = self.row_mut(row_id) else {
            log::warn!("save failure dropped: row {row_id} is not in the working set");
            return None;
        };
        for error in &errors {
            if let Some(cell) = row.cell_mut(&error.field) {
                cell.validity = Validity::Invalid {
                    reason: error.reason.clone(),
                };
            }
        }
        row.refresh_flags();
        Some(RowSaveStatus::Failed { errors })
    }
}
