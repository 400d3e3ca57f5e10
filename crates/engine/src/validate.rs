//! Asynchronous cell validation, cooperatively scheduled.
//!
//! The editor never blocks on validation: `begin_validation` hands a request
//! to the transport collaborator and `complete_validation` applies the result
//! when it arrives. There is no cancellation — a result that arrives after
//! the cell was edited again is simply discarded, guarded by the cell's
//! monotonically increasing edit counter.

use serde::{Deserialize, Serialize};

use rostergrid_model::{RowId, Validity, Value};
use rustc_hash::FxHashMap;

use crate::editor::Editor;

/// Reason attached to duplicated identifier values across the working set.
pub const UNIQUENESS_REASON: &str = "must be unique";

/// A request the engine hands to the validation collaborator: one field name
/// and one candidate value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub ticket: u64,
    pub row_id: RowId,
    pub field: String,
    pub candidate: Value,
}

/// Result returned by the validation collaborator for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Valid,
    Invalid { reason: String },
}

/// Book-keeping for one dispatched validation.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub ticket: u64,
    /// Cell edit counter at dispatch. The result is stale once it differs.
    pub edit_seq: u64,
}

impl Editor {
    /// Mark the cell `Validating` and produce the request for the transport
    /// collaborator. A newer dispatch for the same cell supersedes the old
    /// in-flight entry, so the older result can never land.
    pub fn begin_validation(&mut self, row_id: RowId, field: &str) -> Option<ValidationRequest> {
        let Some(name) = self.schema.get(field).map(|c| c.name.clone()) else {
            log::warn!("validation skipped: unknown field '{field}'");
            return None;
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let Some(row) = self.row_mut(row_id) else {
            log::warn!("validation skipped: row {row_id} is not in the working set");
            return None;
        };
        let Some(cell) = row.cell_mut(&name) else {
            log::warn!("validation skipped: row {row_id} has no cell for '{name}'");
            return None;
        };
        cell.validity = Validity::Validating;
        let candidate = cell.value.clone();
        let edit_seq = cell.edit_seq;
        row.refresh_flags();

        self.inflight
            .insert((row_id, name.clone()), InFlight { ticket, edit_seq });
        Some(ValidationRequest {
            ticket,
            row_id,
            field: name,
            candidate,
        })
    }

    /// Apply a validation result, unless it is stale.
    ///
    /// Stale means: the ticket is no longer in the in-flight set (a newer
    /// dispatch replaced it), or the cell's edit counter moved since
    /// dispatch. Applying a stale result would mark a newer value with an
    /// older value's verdict.
    pub fn complete_validation(&mut self, ticket: u64, outcome: ValidationOutcome) {
        let Some((key, entry)) = self
            .inflight
            .iter()
            .find(|(_, v)| v.ticket == ticket)
            .map(|(k, v)| (k.clone(), v.clone()))
        else {
            log::debug!("validation result {ticket} discarded: superseded or unknown");
            return;
        };
        self.inflight.remove(&key);
        let (row_id, field) = key;

        let Some(row) = self.row_mut(row_id) else {
            log::debug!("validation result {ticket} discarded: row {row_id} is gone");
            return;
        };
        let Some(cell) = row.cell_mut(&field) else {
            return;
        };
        if cell.edit_seq != entry.edit_seq {
            log::debug!(
                "validation result {ticket} discarded: {row_id}.{field} edited since dispatch"
            );
            return;
        }
        cell.validity = match outcome {
            ValidationOutcome::Valid => Validity::Valid,
            ValidationOutcome::Invalid { reason } => Validity::Invalid { reason },
        };
        row.refresh_flags();
    }

    /// Number of validations currently awaiting a result.
    pub fn pending_validations(&self) -> usize {
        self.inflight.len()
    }

    /// Synchronous cross-row sweep of the identifier column.
    ///
    /// Every row sharing a duplicated non-empty identifier goes invalid with
    /// the uniqueness reason — including a previously-unique row that now
    /// collides. Rows that stopped colliding get the uniqueness reason lifted,
    /// but an identifier cell held invalid for any other reason keeps it.
    pub(crate) fn refresh_identifier_uniqueness(&mut self) {
        let field = self.schema.identifier().to_string();

        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for row in &self.rows {
            if let Some(cell) = row.cell(&field) {
                let key = cell.value.display();
                if !key.is_empty() {
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
        }

        for row in &mut self.rows {
            let Some(cell) = row.cell_mut(&field) else {
                continue;
            };
            let key = cell.value.display();
            let duplicated = !key.is_empty() && counts.get(&key).is_some_and(|&n| n > 1);
            if duplicated {
                cell.validity = Validity::invalid(UNIQUENESS_REASON);
            } else if cell.validity.reason() == Some(UNIQUENESS_REASON) {
                cell.validity = Validity::Valid;
            }
            row.refresh_flags();
        }
    }
}
