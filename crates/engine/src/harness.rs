//! Shared test fixtures: a people-record schema and canned snapshots.

use rostergrid_model::{
    ColumnSpec, ConcurrencyToken, DerivedSpec, LookupEntry, LookupTable, RecordSnapshot,
    SchemaRegistry, Value,
};

/// People-record schema exercising every cell kind the editor cares about.
pub fn person_schema() -> SchemaRegistry {
    let languages = LookupTable::new(vec![
        LookupEntry::new(1, "es", "Spanish"),
        LookupEntry::new(2, "fr", "French"),
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

/// A minimal persisted record for Jane Doe.
pub fn jane_snapshot(id: i64, version: i64) -> RecordSnapshot {
    RecordSnapshot::new(id, ConcurrencyToken::new(version))
        .with_value("employee_no", Value::Decimal(id as f64))
        .with_value("first_name", Value::Text("Jane".into()))
        .with_value("last_name", Value::Text("Doe".into()))
}
