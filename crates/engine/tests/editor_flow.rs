//! End-to-end editing session: load, edit, paste, validate, conflict, save.

use rostergrid_engine::{
    Editor, FieldError, RowSaveStatus, SaveSuccess, ValidationOutcome, UNIQUENESS_REASON,
};
use rostergrid_model::{
    ColumnSpec, ConcurrencyToken, DerivedSpec, LookupEntry, LookupTable, RecordSnapshot, RowId,
    SchemaRegistry, Value,
};
use rustc_hash::FxHashMap;

fn schema() -> SchemaRegistry {
    let languages = LookupTable::new(vec![
        LookupEntry::new(1, "es", "Spanish"),
        LookupEntry::new(2, "fr", "French"),
        LookupEntry::new(3, "pt", "Portuguese"),
    ]);
    SchemaRegistry::new(
        vec![
            ColumnSpec::decimal("employee_no", "Employee No").required(),
            ColumnSpec::text("first_name", "First Name").required(),
            ColumnSpec::text("nickname", "Nickname"),
            ColumnSpec::text("last_name", "Last Name").required(),
            ColumnSpec::text("suffix", "Suffix"),
            ColumnSpec::derived(
                "display_name",
                "Display Name",
                DerivedSpec::new(vec![
                    "first_name".into(),
                    "nickname".into(),
                    "last_name".into(),
                    "suffix".into(),
                ])
                .with_quoted("nickname"),
            ),
            ColumnSpec::structured_list("alternate_names", "Alternate Names"),
            ColumnSpec::multi_relationship("languages", "Languages", languages),
            ColumnSpec::date("start_date", "Start Date"),
        ],
        "employee_no",
    )
    .unwrap()
}

fn record(id: i64, version: i64, first: &str, last: &str) -> RecordSnapshot {
    RecordSnapshot::new(id, ConcurrencyToken::new(version))
        .with_value("employee_no", Value::Decimal(id as f64))
        .with_value("first_name", Value::Text(first.into()))
        .with_value("last_name", Value::Text(last.into()))
}

/// The data-model invariants that must hold after every engine call.
fn assert_invariants(editor: &Editor) {
    for row in editor.rows() {
        let mut any_edited = false;
        let mut any_invalid = false;
        for column in editor.schema().columns() {
            let Some(cell) = row.cell(&column.name) else {
                continue;
            };
            assert_eq!(
                cell.is_edited(),
                cell.value != cell.original,
                "is_edited must track value vs original for {}",
                column.name
            );
            any_edited |= cell.is_edited();
            any_invalid |= cell.validity.is_invalid();
        }
        assert_eq!(row.has_changes(), any_edited, "row {} has_changes stale", row.id);
        assert_eq!(row.has_errors(), any_invalid, "row {} has_errors stale", row.id);
    }
}

#[test]
fn full_session_flow() {
    let mut editor = Editor::new(schema());
    editor.load_records(vec![
        record(100, 1, "Jane", "Doe"),
        record(101, 1, "Maria", "Sanchez"),
    ]);
    assert_invariants(&editor);
    assert!(!editor.is_dirty());

    let jane = RowId::Persisted(100);
    let maria = RowId::Persisted(101);

    // Manual edits recompute the derived display name.
    editor.apply_cell_edit(jane, "nickname", "JJ");
    editor.apply_cell_edit(jane, "suffix", "Jr.");
    assert_invariants(&editor);
    assert_eq!(
        editor.row(jane).unwrap().cell("display_name").unwrap().text,
        "Jane \"JJ\" Doe Jr."
    );

    // A batch paste is one history entry.
    editor
        .apply_batch_paste(&[
            (maria, "alternate_names".into(), "M. Sanchez, Mary S.".into()),
            (maria, "languages".into(), "es, pt".into()),
        ])
        .unwrap();
    assert_invariants(&editor);

    // Undo the paste in one step, then redo it.
    assert!(editor.undo());
    assert_invariants(&editor);
    assert!(editor.row(maria).unwrap().cell("alternate_names").unwrap().value.is_empty());
    assert!(editor.redo());
    assert_invariants(&editor);
    assert_eq!(
        editor.row(maria).unwrap().cell("languages").unwrap().value,
        Value::References(vec![
            rostergrid_model::RefTarget::new(1, "Spanish"),
            rostergrid_model::RefTarget::new(3, "Portuguese"),
        ])
    );

    // Async validation with a stale-result race.
    let first_request = editor.begin_validation(jane, "nickname").unwrap();
    editor.apply_cell_edit(jane, "nickname", "Jay");
    let second_request = editor.begin_validation(jane, "nickname").unwrap();
    editor.complete_validation(
        first_request.ticket,
        ValidationOutcome::Invalid {
            reason: "nickname taken".into(),
        },
    );
    editor.complete_validation(second_request.ticket, ValidationOutcome::Valid);
    assert_invariants(&editor);
    assert!(editor.row(jane).unwrap().cell("nickname").unwrap().validity.is_valid());

    // Save Jane against a concurrently modified record: the moved field is
    // skipped, the rest of the row still saves.
    let mut live = record(100, 2, "Jane", "Doe-Smith");
    live.values.insert("suffix".into(), Value::Empty);
    let prepared = editor.prepare_save(jane, Some(&live)).unwrap();
    assert_eq!(prepared.skipped, vec!["last_name".to_string()]);
    assert_eq!(
        prepared
            .payload
            .fields
            .iter()
            .map(|(f, _)| f.as_str())
            .collect::<Vec<_>>(),
        vec!["nickname", "suffix"]
    );

    let mut values = FxHashMap::default();
    for (field, value) in &prepared.payload.fields {
        values.insert(field.clone(), value.clone());
    }
    let status = editor
        .apply_save_success(
            jane,
            SaveSuccess {
                id: 100,
                token: ConcurrencyToken::new(3),
                values,
            },
        )
        .unwrap();
    assert_eq!(
        status,
        RowSaveStatus::SavedWithSkippedFields {
            skipped: vec!["last_name".to_string()]
        }
    );
    assert_invariants(&editor);

    // Jane still carries the unacknowledged conflict but no pending edits;
    // Maria's batch paste keeps the sheet dirty.
    assert!(!editor.row(jane).unwrap().has_changes());
    assert!(editor.row(jane).unwrap().cell("last_name").unwrap().has_conflict);
    assert!(editor.is_dirty());
}

#[test]
fn uniqueness_collision_and_resolution_across_rows() {
    let mut editor = Editor::new(schema());
    editor.load_records(vec![
        record(100, 1, "Jane", "Doe"),
        record(101, 1, "Maria", "Sanchez"),
    ]);

    editor.apply_cell_edit(RowId::Persisted(101), "employee_no", "100");
    assert_invariants(&editor);
    for id in [RowId::Persisted(100), RowId::Persisted(101)] {
        assert_eq!(
            editor.row(id).unwrap().cell("employee_no").unwrap().validity.reason(),
            Some(UNIQUENESS_REASON)
        );
    }

    editor.apply_cell_edit(RowId::Persisted(101), "employee_no", "101");
    assert_invariants(&editor);
    for id in [RowId::Persisted(100), RowId::Persisted(101)] {
        assert!(editor.row(id).unwrap().cell("employee_no").unwrap().validity.is_valid());
    }
}

#[test]
fn failed_sibling_does_not_block_successful_row() {
    let mut editor = Editor::new(schema());
    editor.load_records(vec![
        record(100, 1, "Jane", "Doe"),
        record(101, 1, "Maria", "Sanchez"),
    ]);
    let jane = RowId::Persisted(100);
    let maria = RowId::Persisted(101);
    editor.apply_cell_edit(jane, "first_name", "Janet");
    editor.apply_cell_edit(maria, "first_name", "Marie");

    // Jane's save is rejected per-field; Maria's succeeds.
    editor.apply_save_failure(
        jane,
        vec![FieldError {
            field: "first_name".into(),
            reason: "locked by HR".into(),
        }],
    );
    let prepared = editor.prepare_save(maria, Some(&record(101, 1, "Maria", "Sanchez"))).unwrap();
    let mut values = FxHashMap::default();
    for (field, value) in &prepared.payload.fields {
        values.insert(field.clone(), value.clone());
    }
    editor.apply_save_success(
        maria,
        SaveSuccess {
            id: 101,
            token: ConcurrencyToken::new(2),
            values,
        },
    );

    assert_invariants(&editor);
    assert!(editor.row(jane).unwrap().has_errors());
    assert!(editor.row(jane).unwrap().has_changes());
    assert!(!editor.row(maria).unwrap().has_changes());
    // The sheet stays dirty only because of the failed row.
    assert!(editor.is_dirty());
}
