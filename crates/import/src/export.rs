//! Export encoding: the inverse boundary of import.
//!
//! Structured-list columns are emitted as the serialized list literal (never
//! flat comma-separated text), so membership survives a round-trip through
//! import even when members contain commas or quotation marks.

use rostergrid_model::schema::encode_string_list;
use rostergrid_model::{CellKind, Row, SchemaRegistry, Value};

use crate::reconcile::ParsedRow;

/// Produce one column→text mapping per row, in schema column order, keyed by
/// display header. The output feeds straight back into `reconcile`.
pub fn export_rows(schema: &SchemaRegistry, rows: &[Row]) -> Vec<ParsedRow> {
    rows.iter().map(|row| export_row(schema, row)).collect()
}

fn export_row(schema: &SchemaRegistry, row: &Row) -> ParsedRow {
    let mut out = ParsedRow::new();
    for column in schema.columns() {
        let Some(cell) = row.cell(&column.name) else {
            continue;
        };
        let text = match (column.kind, &cell.value) {
            (CellKind::StructuredList, Value::List(items)) => encode_string_list(items),
            _ => cell.text.clone(),
        };
        out.cells.push((column.header.clone(), text));
    }
    out
}
