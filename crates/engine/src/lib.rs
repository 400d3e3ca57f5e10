//! `rostergrid-engine` — Batch editing engine over the grid data model.
//!
//! The `Editor` owns one editing session's working set (rows, history,
//! in-flight validations). All cell and row mutation flows through its entry
//! points and the undo/redo path; no other code touches cell state, so the
//! cached dirty/error flags can never diverge from the values.

pub mod conflict;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod save;
pub mod validate;

#[cfg(test)]
pub mod harness;

pub use conflict::ConflictReport;
pub use config::EditorConfig;
pub use editor::Editor;
pub use error::ConfigError;
pub use history::{ChangeRecord, EntryKind, History, HistoryEntry};
pub use save::{FieldError, PreparedSave, RowSaveStatus, SavePayload, SaveSuccess};
pub use validate::{ValidationOutcome, ValidationRequest, UNIQUENESS_REASON};
