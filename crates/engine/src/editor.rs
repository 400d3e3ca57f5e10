//! The editing working set and its mutation entry points.
//!
//! One `Editor` is created when the batch editor opens and dropped (or
//! `clear_changes`d) when it closes. Rows enter via `load_records`, import
//! output (`insert_rows`), or `add_draft_row`; every cell mutation funnels
//! through `apply_cell_edit` / `apply_batch_paste` so that edited/dirty
//! flags, derived columns, and history stay consistent.

use rustc_hash::FxHashMap;

use rostergrid_model::{
    Cell, CellKind, ColumnSpec, RecordSnapshot, Row, RowId, SchemaRegistry, Validity, Value,
};

use crate::config::EditorConfig;
use crate::history::{ChangeRecord, History, HistoryEntry};
use crate::validate::InFlight;

pub struct Editor {
    pub(crate) schema: SchemaRegistry,
    pub(crate) rows: Vec<Row>,
    pub(crate) history: History,
    /// In-flight validations keyed by row + field.
    pub(crate) inflight: FxHashMap<(RowId, String), InFlight>,
    pub(crate) next_ticket: u64,
    is_dirty: bool,
    status: Option<String>,
}

impl Editor {
    pub fn new(schema: SchemaRegistry) -> Self {
        Self::with_config(schema, EditorConfig::default())
    }

    pub fn with_config(schema: SchemaRegistry, config: EditorConfig) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            history: History::new(config.max_history),
            inflight: FxHashMap::default(),
            next_ticket: 1,
            is_dirty: false,
            status: None,
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, row_id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Last operator-facing status message (derived-edit rejections,
    /// "Nothing to undo", partial-save notes).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    // -----------------------------------------------------------------------
    // Row lifecycle
    // -----------------------------------------------------------------------

    /// Convert persisted records into rows. Every cell's original equals its
    /// value, so freshly loaded rows carry no edits.
    pub fn load_records(&mut self, records: Vec<RecordSnapshot>) {
        let built: Vec<Row> = records.iter().map(|r| self.build_loaded_row(r)).collect();
        self.rows.extend(built);
        self.refresh_identifier_uniqueness();
        self.refresh_dirty();
    }

    /// Add reconciled import rows to the working set.
    pub fn insert_rows(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
        self.refresh_identifier_uniqueness();
        self.refresh_dirty();
    }

    /// New empty draft row. Gets a real identifier only on save.
    pub fn add_draft_row(&mut self) -> RowId {
        let id = RowId::draft();
        let mut cells = FxHashMap::default();
        for column in self.schema.columns() {
            cells.insert(column.name.clone(), Cell::draft(Value::Empty));
        }
        self.rows.push(Row::new(id, cells, None));
        self.refresh_dirty();
        id
    }

    pub fn delete_row(&mut self, row_id: RowId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != row_id);
        let removed = self.rows.len() != before;
        if removed {
            self.inflight.retain(|(id, _), _| *id != row_id);
            self.refresh_identifier_uniqueness();
            self.refresh_dirty();
        }
        removed
    }

    /// Discard all unsaved work: drafts are dropped, persisted rows revert
    /// to their originals, history and in-flight validations are cleared.
    pub fn clear_changes(&mut self) {
        self.rows.retain(|r| !r.is_draft());
        let columns: Vec<ColumnSpec> = self.schema.columns().to_vec();
        for row in &mut self.rows {
            for column in &columns {
                let Some(cell) = row.cell_mut(&column.name) else {
                    continue;
                };
                if cell.is_edited() || cell.validity != Validity::Valid {
                    cell.value = cell.original.clone();
                    cell.text = column.format_value(&cell.value);
                    cell.validity = Validity::Valid;
                    cell.edit_seq += 1;
                }
            }
            row.refresh_flags();
        }
        self.history.clear();
        self.inflight.clear();
        self.refresh_identifier_uniqueness();
        self.refresh_dirty();
    }

    pub fn set_selected(&mut self, row_id: RowId, selected: bool) {
        if let Some(row) = self.row_mut(row_id) {
            row.is_selected = selected;
        }
    }

    /// Acknowledgment gesture: opening a conflicted cell marks it reviewed,
    /// whether or not the operator goes on to change the value.
    pub fn open_cell_for_edit(&mut self, row_id: RowId, field: &str) {
        let Some(name) = self.schema.get(field).map(|c| c.name.clone()) else {
            log::warn!("open ignored: unknown field '{field}'");
            return;
        };
        let Some(row) = self.row_mut(row_id) else {
            log::warn!("open ignored: row {row_id} is not in the working set");
            return;
        };
        if let Some(cell) = row.cell_mut(&name) {
            cell.has_conflict = false;
        }
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Apply a single-cell edit and record it as one undoable entry.
    ///
    /// A missing row or field is a logged no-op: the grid may have been
    /// concurrently re-rendered and the reference gone stale.
    pub fn apply_cell_edit(&mut self, row_id: RowId, field: &str, input: &str) {
        let description = match self.schema.get(field) {
            Some(column) => format!("Edit {}", column.header),
            None => format!("Edit {field}"),
        };
        if let Some(changes) = self.edit_cell(row_id, field, input) {
            self.history.record(HistoryEntry::single(description, changes));
        }
    }

    /// Apply a multi-cell paste. Each edit goes through the single-cell path
    /// but all change records coalesce into one batch entry, so one undo
    /// reverses the entire paste.
    pub fn apply_batch_paste(&mut self, edits: &[(RowId, String, String)]) -> Option<HistoryEntry> {
        let mut changes = Vec::new();
        for (row_id, field, input) in edits {
            if let Some(mut edit_changes) = self.edit_cell(*row_id, field, input) {
                changes.append(&mut edit_changes);
            }
        }
        if changes.is_empty() {
            return None;
        }
        let entry = HistoryEntry::batch(format!("Paste {} cells", edits.len()), changes);
        self.history.record(entry.clone());
        Some(entry)
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    /// Replay the most recent entry's old state. Bypasses derived-column
    /// recomputation (the entry already contains the derived cells' old
    /// state) but still refreshes row and sheet flags.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            self.status = Some("Nothing to undo".to_string());
            return false;
        };
        for change in entry.changes.iter().rev() {
            self.replay(change, true);
        }
        if self.touches_identifier(&entry) {
            self.refresh_identifier_uniqueness();
        }
        self.refresh_dirty();
        self.history.push_undone(entry);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            self.status = Some("Nothing to redo".to_string());
            return false;
        };
        for change in &entry.changes {
            self.replay(change, false);
        }
        if self.touches_identifier(&entry) {
            self.refresh_identifier_uniqueness();
        }
        self.refresh_dirty();
        self.history.push_redone(entry);
        true
    }

    /// Replaying an identifier change reruns the cross-row uniqueness sweep;
    /// the collision flags on sibling rows are not part of the entry itself.
    fn touches_identifier(&self, entry: &HistoryEntry) -> bool {
        entry
            .changes
            .iter()
            .any(|c| c.field == self.schema.identifier())
    }

    fn replay(&mut self, change: &ChangeRecord, backwards: bool) {
        let Some(row) = self.rows.iter_mut().find(|r| r.id == change.row_id) else {
            return;
        };
        let Some(cell) = row.cell_mut(&change.field) else {
            return;
        };
        if backwards {
            cell.value = change.old_value.clone();
            cell.text = change.old_text.clone();
            cell.validity = change.old_validity.clone();
        } else {
            cell.value = change.new_value.clone();
            cell.text = change.new_text.clone();
            cell.validity = change.new_validity.clone();
        }
        // Replays count as edits for the stale-validation guard.
        cell.edit_seq += 1;
        row.refresh_flags();
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// The one code path that changes a cell from operator input. Returns the
    /// change records (the edited cell plus recomputed derived cells), or
    /// `None` when nothing happened.
    pub(crate) fn edit_cell(
        &mut self,
        row_id: RowId,
        field: &str,
        input: &str,
    ) -> Option<Vec<ChangeRecord>> {
        let Some(column) = self.schema.get(field).cloned() else {
            log::warn!("edit ignored: unknown field '{field}' on row {row_id}");
            return None;
        };
        let Some(row_idx) = self.rows.iter().position(|r| r.id == row_id) else {
            log::warn!("edit ignored: row {row_id} is not in the working set");
            return None;
        };

        if column.read_only {
            let message = if column.kind == CellKind::Derived {
                column.derived_edit_rejection()
            } else {
                format!("{} is read-only", column.header)
            };
            log::warn!("edit rejected: {message}");
            self.status = Some(message);
            return None;
        }

        let parsed = column.parse_input(input);
        let mut changes = Vec::new();
        {
            let row = &mut self.rows[row_idx];
            let Some(cell) = row.cell_mut(&column.name) else {
                log::warn!("edit ignored: row {row_id} has no cell for '{}'", column.name);
                return None;
            };

            let old_value = cell.value.clone();
            let old_text = cell.text.clone();
            let old_validity = cell.validity.clone();

            cell.value = parsed.value;
            cell.text = match &parsed.error {
                // Keep what the operator typed when it did not parse cleanly.
                Some(_) => input.trim().to_string(),
                None => column.format_value(&cell.value),
            };
            cell.validity = match parsed.error {
                Some(reason) => Validity::Invalid { reason },
                None => Validity::Valid,
            };
            cell.edit_seq += 1;

            if cell.value != old_value || cell.text != old_text || cell.validity != old_validity {
                changes.push(ChangeRecord {
                    row_id,
                    field: column.name.clone(),
                    old_value,
                    new_value: cell.value.clone(),
                    old_text,
                    new_text: cell.text.clone(),
                    old_validity,
                    new_validity: cell.validity.clone(),
                });
            }
        }

        changes.extend(self.recompute_derived(row_idx, &column.name));
        self.rows[row_idx].refresh_flags();
        if column.name == self.schema.identifier() {
            self.refresh_identifier_uniqueness();
        }
        self.refresh_dirty();
        Some(changes)
    }

    /// Recompute every derived column declaring `source` as an input.
    /// Composition is a pure function of the source texts, so recomputing
    /// with unchanged sources produces no change records.
    fn recompute_derived(&mut self, row_idx: usize, source: &str) -> Vec<ChangeRecord> {
        let dependents: Vec<(String, rostergrid_model::DerivedSpec)> = self
            .schema
            .derived_dependents(source)
            .into_iter()
            .filter_map(|c| c.derived.clone().map(|d| (c.name.clone(), d)))
            .collect();

        let mut changes = Vec::new();
        let row_id = self.rows[row_idx].id;
        for (name, recipe) in dependents {
            let composed = {
                let row = &self.rows[row_idx];
                recipe.compose(|f| row.cell(f).map(|c| c.text.clone()).unwrap_or_default())
            };
            let new_value = if composed.is_empty() {
                Value::Empty
            } else {
                Value::Text(composed.clone())
            };

            let Some(cell) = self.rows[row_idx].cell_mut(&name) else {
                continue;
            };
            if cell.value == new_value && cell.text == composed {
                continue;
            }
            changes.push(ChangeRecord {
                row_id,
                field: name.clone(),
                old_value: cell.value.clone(),
                new_value: new_value.clone(),
                old_text: cell.text.clone(),
                new_text: composed.clone(),
                old_validity: cell.validity.clone(),
                new_validity: cell.validity.clone(),
            });
            cell.value = new_value;
            cell.text = composed;
            cell.edit_seq += 1;
        }
        changes
    }

    pub(crate) fn row_mut(&mut self, row_id: RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == row_id)
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub(crate) fn refresh_dirty(&mut self) {
        self.is_dirty = self.rows.iter().any(|r| r.has_changes() || r.is_draft());
    }

    fn build_loaded_row(&self, record: &RecordSnapshot) -> Row {
        let mut cells: FxHashMap<String, Cell> = FxHashMap::default();
        for column in self.schema.columns() {
            if column.kind == CellKind::Derived {
                continue;
            }
            let mut value = record.value(&column.name).clone();
            if column.name == self.schema.identifier() && value.is_empty() {
                value = Value::Decimal(record.id as f64);
            }
            cells.insert(column.name.clone(), Cell::loaded(value));
        }
        for column in self.schema.columns() {
            let Some(recipe) = &column.derived else {
                continue;
            };
            let composed = recipe.compose(|f| {
                cells.get(f).map(|c| c.text.clone()).unwrap_or_default()
            });
            let value = if composed.is_empty() {
                Value::Empty
            } else {
                Value::Text(composed)
            };
            cells.insert(column.name.clone(), Cell::loaded(value));
        }
        Row::new(RowId::Persisted(record.id), cells, Some(record.token.clone()))
    }
}
