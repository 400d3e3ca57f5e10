//! Matching imported rows to existing records.
//!
//! Each parsed row either binds to an existing record by its identifier
//! value (first occurrence wins) or becomes a new draft. Bound rows keep the
//! database value as every cell's original and overlay the imported text, so
//! unchanged fields show no edit and changed fields read as edited. Drafts
//! get sequential identifiers above the current maximum, assigned in input
//! order; identifiers supplied for rows that bind nothing are discarded,
//! never reused.

use rustc_hash::{FxHashMap, FxHashSet};

use rostergrid_model::schema::normalize_name;
use rostergrid_model::{
    Cell, CellKind, ColumnSpec, RecordSnapshot, Row, RowId, SchemaRegistry, Validity, Value,
};

/// One already-decoded spreadsheet row: ordered (column name, raw text).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRow {
    pub cells: Vec<(String, String)>,
}

impl ParsedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, raw: impl Into<String>) -> Self {
        self.cells.push((column.into(), raw.into()));
        self
    }
}

/// Result of a reconciliation pass.
#[derive(Debug)]
pub struct ImportOutput {
    pub rows: Vec<Row>,
    /// Input column names that matched no schema column and were dropped.
    pub dropped_columns: Vec<String>,
}

/// Reconcile parsed rows against the existing records, in input order.
pub fn reconcile(
    schema: &SchemaRegistry,
    parsed_rows: &[ParsedRow],
    existing: &FxHashMap<i64, RecordSnapshot>,
) -> ImportOutput {
    // Computed once per pass; discarded input identifiers never shrink it.
    let max_existing = existing.keys().copied().max().unwrap_or(0);
    let mut next_identifier = max_existing;

    let mut bound: FxHashSet<i64> = FxHashSet::default();
    let mut dropped: Vec<String> = Vec::new();
    let mut rows = Vec::new();

    for parsed in parsed_rows {
        let mapped = map_columns(schema, parsed, &mut dropped);

        let claimed = mapped
            .get(schema.identifier())
            .and_then(|raw| parse_identifier(raw));
        let target = claimed
            .and_then(|id| existing.get(&id))
            .filter(|record| !bound.contains(&record.id));

        let row = match target {
            Some(record) => {
                bound.insert(record.id);
                bind_existing(schema, &mapped, record)
            }
            None => {
                next_identifier += 1;
                new_draft(schema, &mapped, next_identifier)
            }
        };
        rows.push(row);
    }

    if !dropped.is_empty() {
        log::debug!("import dropped unrecognized columns: {}", dropped.join(", "));
    }
    ImportOutput {
        rows,
        dropped_columns: dropped,
    }
}

/// Match input columns onto schema columns, case-insensitively and with
/// whitespace normalized. Unrecognized columns are dropped; derived display
/// columns are always ignored regardless of their content.
fn map_columns<'a>(
    schema: &SchemaRegistry,
    parsed: &'a ParsedRow,
    dropped: &mut Vec<String>,
) -> FxHashMap<String, &'a str> {
    let mut mapped: FxHashMap<String, &'a str> = FxHashMap::default();
    for (column, raw) in &parsed.cells {
        match schema.get(column) {
            Some(spec) if spec.kind == CellKind::Derived => {}
            Some(spec) => {
                mapped.insert(spec.name.clone(), raw.as_str());
            }
            None => {
                let name = normalize_name(column);
                if !dropped.iter().any(|d| normalize_name(d) == name) {
                    dropped.push(column.clone());
                }
            }
        }
    }
    mapped
}

fn parse_identifier(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Overlay imported raw text onto a cell, exactly as a manual edit would.
fn apply_raw(column: &ColumnSpec, cell: &mut Cell, raw: &str) {
    let parsed = column.parse_input(raw);
    cell.value = parsed.value;
    cell.text = match &parsed.error {
        Some(_) => raw.trim().to_string(),
        None => column.format_value(&cell.value),
    };
    cell.validity = match parsed.error {
        Some(reason) => Validity::Invalid { reason },
        None => Validity::Valid,
    };
}

fn bind_existing(
    schema: &SchemaRegistry,
    mapped: &FxHashMap<String, &str>,
    record: &RecordSnapshot,
) -> Row {
    let mut cells: FxHashMap<String, Cell> = FxHashMap::default();
    for column in schema.columns() {
        if column.kind == CellKind::Derived {
            continue;
        }
        let mut db_value = record.value(&column.name).clone();
        if column.name == schema.identifier() && db_value.is_empty() {
            db_value = Value::Decimal(record.id as f64);
        }
        let mut cell = Cell::loaded(db_value);
        if let Some(raw) = mapped.get(&column.name) {
            apply_raw(column, &mut cell, raw);
        }
        cells.insert(column.name.clone(), cell);
    }

    for column in schema.columns() {
        let Some(recipe) = &column.derived else {
            continue;
        };
        let now = recipe.compose(|f| cells.get(f).map(|c| c.text.clone()).unwrap_or_default());
        let orig =
            recipe.compose(|f| cells.get(f).map(|c| c.original.display()).unwrap_or_default());
        let mut cell = Cell::loaded(text_value(&orig));
        if now != orig {
            cell.value = text_value(&now);
            cell.text = now;
        }
        cells.insert(column.name.clone(), cell);
    }

    Row::new(RowId::Persisted(record.id), cells, Some(record.token.clone()))
}

fn new_draft(schema: &SchemaRegistry, mapped: &FxHashMap<String, &str>, assigned: i64) -> Row {
    let mut cells: FxHashMap<String, Cell> = FxHashMap::default();
    for column in schema.columns() {
        if column.kind == CellKind::Derived {
            continue;
        }
        let mut cell = Cell::draft(Value::Empty);
        if column.name == schema.identifier() {
            // Any supplied identifier was discarded in the binding step.
            cell.value = Value::Decimal(assigned as f64);
            cell.text = cell.value.display();
        } else if let Some(raw) = mapped.get(&column.name) {
            apply_raw(column, &mut cell, raw);
        }
        cells.insert(column.name.clone(), cell);
    }

    for column in schema.columns() {
        let Some(recipe) = &column.derived else {
            continue;
        };
        let composed = recipe.compose(|f| cells.get(f).map(|c| c.text.clone()).unwrap_or_default());
        cells.insert(column.name.clone(), Cell::draft(text_value(&composed)));
    }

    Row::new(RowId::draft(), cells, None)
}

fn text_value(text: &str) -> Value {
    if text.is_empty() {
        Value::Empty
    } else {
        Value::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rostergrid_model::{ConcurrencyToken, DerivedSpec, LookupEntry, LookupTable, RefTarget};

    fn schema() -> SchemaRegistry {
        let languages = LookupTable::new(vec![
            LookupEntry::new(1, "es", "Spanish"),
            LookupEntry::new(2, "fr", "French"),
        ]);
        SchemaRegistry::new(
            vec![
                ColumnSpec::decimal("employee_no", "Employee No").required(),
                ColumnSpec::text("first_name", "First Name").required(),
                ColumnSpec::text("last_name", "Last Name").required(),
                ColumnSpec::derived(
                    "display_name",
                    "Display Name",
                    DerivedSpec::new(vec!["first_name".into(), "last_name".into()]),
                ),
                ColumnSpec::structured_list("alternate_names", "Alternate Names"),
                ColumnSpec::multi_relationship("languages", "Languages", languages),
                ColumnSpec::date("start_date", "Start Date"),
            ],
            "employee_no",
        )
        .unwrap()
    }

    fn existing_jane(id: i64) -> (i64, RecordSnapshot) {
        (
            id,
            RecordSnapshot::new(id, ConcurrencyToken::new(1))
                .with_value("employee_no", Value::Decimal(id as f64))
                .with_value("first_name", Value::Text("Jane".into()))
                .with_value("last_name", Value::Text("Doe".into())),
        )
    }

    #[test]
    fn matching_identifier_binds_with_edit_markers() {
        let existing = FxHashMap::from_iter([existing_jane(100)]);
        let rows = vec![ParsedRow::new()
            .with("Employee No", "100")
            .with("First Name", "Jane")
            .with("Last Name", "Doe-Smith")];

        let output = reconcile(&schema(), &rows, &existing);
        let row = &output.rows[0];
        assert_eq!(row.id, RowId::Persisted(100));
        assert!(!row.is_draft());
        // Unchanged field shows no edit; changed field reads as edited.
        assert!(!row.cell("first_name").unwrap().is_edited());
        assert!(row.cell("last_name").unwrap().is_edited());
        assert_eq!(
            row.cell("last_name").unwrap().original,
            Value::Text("Doe".into())
        );
        assert_eq!(row.cell("display_name").unwrap().text, "Jane Doe-Smith");
    }

    #[test]
    fn unmatched_rows_become_drafts_with_sequential_identifiers() {
        let existing = FxHashMap::from_iter([existing_jane(100), existing_jane(140)]);
        let rows = vec![
            ParsedRow::new().with("First Name", "Ana"),
            // Stale identifier that matches nothing: discarded, not reused.
            ParsedRow::new().with("Employee No", "9000").with("First Name", "Bo"),
            ParsedRow::new().with("First Name", "Cy"),
        ];

        let output = reconcile(&schema(), &rows, &existing);
        let ids: Vec<Value> = output
            .rows
            .iter()
            .map(|r| r.cell("employee_no").unwrap().value.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                Value::Decimal(141.0),
                Value::Decimal(142.0),
                Value::Decimal(143.0)
            ]
        );
        assert!(output.rows.iter().all(|r| r.is_draft()));
        assert!(output.rows.iter().all(|r| r.token.is_none()));
    }

    #[test]
    fn duplicate_identifier_claims_bind_first_occurrence_only() {
        let existing = FxHashMap::from_iter([existing_jane(100)]);
        let rows = vec![
            ParsedRow::new().with("Employee No", "100").with("First Name", "Jane"),
            ParsedRow::new().with("Employee No", "100").with("First Name", "Impostor"),
        ];

        let output = reconcile(&schema(), &rows, &existing);
        assert_eq!(output.rows[0].id, RowId::Persisted(100));
        assert!(output.rows[1].is_draft());
        assert_eq!(
            output.rows[1].cell("employee_no").unwrap().value,
            Value::Decimal(101.0)
        );
        assert_eq!(
            output.rows[1].cell("first_name").unwrap().value,
            Value::Text("Impostor".into())
        );
    }

    #[test]
    fn column_matching_is_forgiving_and_drops_unknowns() {
        let existing = FxHashMap::from_iter([existing_jane(100)]);
        let rows = vec![ParsedRow::new()
            .with("  employee   no ", "100")
            .with("FIRST NAME", "Janet")
            .with("Shoe Size", "38")
            .with("shoe  size", "39")];

        let output = reconcile(&schema(), &rows, &existing);
        assert_eq!(output.rows[0].id, RowId::Persisted(100));
        assert!(output.rows[0].cell("first_name").unwrap().is_edited());
        assert_eq!(output.dropped_columns, vec!["Shoe Size".to_string()]);
    }

    #[test]
    fn derived_display_column_in_input_is_ignored() {
        let existing = FxHashMap::from_iter([existing_jane(100)]);
        let rows = vec![ParsedRow::new()
            .with("Employee No", "100")
            .with("Display Name", "Totally Someone Else")];

        let output = reconcile(&schema(), &rows, &existing);
        let row = &output.rows[0];
        assert_eq!(row.cell("display_name").unwrap().text, "Jane Doe");
        assert!(!row.has_changes());
        assert!(output.dropped_columns.is_empty());
    }

    #[test]
    fn structured_list_encodings_normalize_identically() {
        let existing = FxHashMap::default();
        let rows = vec![
            ParsedRow::new().with("Alternate Names", "Maria Sanchez, María Sánchez"),
            ParsedRow::new().with("Alternate Names", r#"["Maria Sanchez","María Sánchez"]"#),
        ];

        let output = reconcile(&schema(), &rows, &existing);
        let expected = Value::List(vec!["Maria Sanchez".into(), "María Sánchez".into()]);
        assert_eq!(output.rows[0].cell("alternate_names").unwrap().value, expected);
        assert_eq!(output.rows[1].cell("alternate_names").unwrap().value, expected);
    }

    #[test]
    fn unresolved_relationship_tokens_error_without_losing_siblings() {
        let existing = FxHashMap::default();
        let rows = vec![ParsedRow::new().with("Languages", "es, Klingon, French")];

        let output = reconcile(&schema(), &rows, &existing);
        let cell = output.rows[0].cell("languages").unwrap();
        assert_eq!(
            cell.value,
            Value::References(vec![
                RefTarget::new(1, "Spanish"),
                RefTarget::new(2, "French")
            ])
        );
        assert_eq!(
            cell.validity.reason(),
            Some("'Klingon' does not match any Languages")
        );
        // The rest of the row is untouched by the bad token.
        assert!(output.rows[0].cell("first_name").unwrap().validity.is_valid());
    }

    #[test]
    fn free_text_dates_pass_through_unparsed() {
        let existing = FxHashMap::default();
        let rows = vec![ParsedRow::new().with("Start Date", "next Tuesday")];
        let output = reconcile(&schema(), &rows, &existing);
        let cell = output.rows[0].cell("start_date").unwrap();
        assert_eq!(cell.value, Value::Date("next Tuesday".into()));
        assert!(cell.validity.is_valid());
    }

    #[test]
    fn empty_existing_index_starts_identifiers_at_one() {
        let existing = FxHashMap::default();
        let rows = vec![ParsedRow::new().with("First Name", "Ana")];
        let output = reconcile(&schema(), &rows, &existing);
        assert_eq!(
            output.rows[0].cell("employee_no").unwrap().value,
            Value::Decimal(1.0)
        );
    }
}
