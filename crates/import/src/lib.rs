//! `rostergrid-import` — Spreadsheet-import reconciliation.
//!
//! Consumes rows an external adapter has already decoded into
//! column-name→raw-text mappings (file parsing stays outside this crate),
//! matches them against existing records, and produces grid rows ready for
//! the editing engine. The export side emits mappings that survive a
//! round-trip back through import.

pub mod export;
pub mod reconcile;

pub use export::export_rows;
pub use reconcile::{reconcile, ImportOutput, ParsedRow};
