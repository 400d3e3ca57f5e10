//! Save-time conflict detection against the live record.
//!
//! A conflict is not a validation failure: the operator's value may be fine,
//! but the stored value moved underneath them since load. Conflicted cells
//! are flagged and excluded from the save payload; the flag is cleared only
//! by the operator opening the cell (`Editor::open_cell_for_edit`), never
//! automatically.

use rostergrid_model::{CellKind, RecordSnapshot, RowId};

use crate::editor::Editor;

/// Fields of one row flagged as conflicted, in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    pub row_id: RowId,
    pub conflicted_fields: Vec<String>,
}

impl ConflictReport {
    pub fn clean(row_id: RowId) -> Self {
        Self {
            row_id,
            conflicted_fields: Vec::new(),
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicted_fields.is_empty()
    }
}

impl Editor {
    /// Compare the row's captured concurrency token against a freshly fetched
    /// one. On mismatch, every cell whose live stored value differs from the
    /// cell's original snapshot is flagged; the row's token is then advanced
    /// to the live token so the reconciled remainder of the row can save.
    pub fn detect_conflicts(&mut self, row_id: RowId, live: &RecordSnapshot) -> ConflictReport {
        let columns: Vec<(String, CellKind)> = self
            .schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.kind))
            .collect();

        let Some(row) = self.row_mut(row_id) else {
            log::warn!("conflict check skipped: row {row_id} is not in the working set");
            return ConflictReport::clean(row_id);
        };

        if row.token.as_ref() != Some(&live.token) {
            for (name, kind) in &columns {
                if *kind == CellKind::Derived {
                    continue;
                }
                let Some(cell) = row.cell_mut(name) else {
                    continue;
                };
                if *live.value(name) != cell.original {
                    cell.has_conflict = true;
                }
            }
            row.token = Some(live.token.clone());
        }

        let mut conflicted = Vec::new();
        for (name, _) in &columns {
            if row.cell(name).is_some_and(|c| c.has_conflict) {
                conflicted.push(name.clone());
            }
        }
        ConflictReport {
            row_id,
            conflicted_fields: conflicted,
        }
    }
}
