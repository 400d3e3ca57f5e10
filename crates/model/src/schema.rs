//! Column schema registry.
//!
//! Per-model configuration for the grid: one `ColumnSpec` per field with its
//! cell kind, choice set or relationship lookup, and parse/format behavior.
//! The closed `CellKind` set keeps per-type handling here instead of
//! scattering conditionals through the editing code.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::value::{RefTarget, Value};

/// Cell type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Text,
    Select,
    Relationship,
    MultiRelationship,
    TriState,
    Date,
    StructuredList,
    Decimal,
    /// Read-only, recomputed from other columns.
    Derived,
}

// ---------------------------------------------------------------------------
// Relationship lookup
// ---------------------------------------------------------------------------

/// One resolvable relationship target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: i64,
    /// Short stable identifier (e.g. "es").
    pub code: String,
    /// Display name (e.g. "Spanish").
    pub name: String,
}

impl LookupEntry {
    pub fn new(id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Lookup descriptor for relationship columns.
///
/// Tokens resolve by exact match on code or display name. Exact means exact:
/// callers wanting forgiving matching should normalize their own input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    entries: Vec<LookupEntry>,
}

impl LookupTable {
    pub fn new(entries: Vec<LookupEntry>) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, token: &str) -> Option<RefTarget> {
        let token = token.trim();
        self.entries
            .iter()
            .find(|e| e.code == token || e.name == token)
            .map(|e| RefTarget::new(e.id, e.name.clone()))
    }
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// Recipe for a read-only derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSpec {
    /// Source columns, in composition order.
    pub sources: Vec<String>,
    /// Source whose non-empty text is wrapped in quotation marks.
    pub quoted: Option<String>,
}

impl DerivedSpec {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            quoted: None,
        }
    }

    pub fn with_quoted(mut self, source: impl Into<String>) -> Self {
        self.quoted = Some(source.into());
        self
    }

    /// Join non-empty component texts in declared order with single spaces.
    /// The quoted component is wrapped in quotation marks when non-empty;
    /// empty components contribute neither text nor a separator.
    pub fn compose(&self, mut text_of: impl FnMut(&str) -> String) -> String {
        let mut parts: Vec<String> = Vec::new();
        for source in &self.sources {
            let text = text_of(source);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if self.quoted.as_deref() == Some(source.as_str()) {
                parts.push(format!("\"{text}\""));
            } else {
                parts.push(text.to_string());
            }
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Structured-list encodings
// ---------------------------------------------------------------------------

/// Parse a structured-list column's raw text.
///
/// Two encodings are accepted: a JSON array literal (exact membership,
/// members may contain commas and quotation marks), or flat comma-separated
/// text split into trimmed non-empty substrings. Both normalize to the same
/// ordered sequence.
pub fn parse_string_list(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed)
            .map_err(|_| format!("'{trimmed}' is not a valid list literal"));
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Encode an ordered list as the JSON array literal used for export, so a
/// re-import preserves exact membership.
pub fn encode_string_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Column spec
// ---------------------------------------------------------------------------

/// Outcome of parsing raw input for a column: the canonical value plus an
/// optional cell-level problem. Partial results are kept — e.g. resolvable
/// relationship tokens survive next to an unresolved one.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub value: Value,
    pub error: Option<String>,
}

impl Parsed {
    fn ok(value: Value) -> Self {
        Self { value, error: None }
    }

    fn problem(value: Value, reason: impl Into<String>) -> Self {
        Self {
            value,
            error: Some(reason.into()),
        }
    }
}

/// Static per-field configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub header: String,
    pub kind: CellKind,
    pub read_only: bool,
    pub required: bool,
    /// Allowed values for `Select` columns.
    pub choices: Vec<String>,
    /// Resolution table for relationship columns.
    pub lookup: Option<LookupTable>,
    /// Composition recipe for `Derived` columns.
    pub derived: Option<DerivedSpec>,
}

impl ColumnSpec {
    fn base(name: impl Into<String>, header: impl Into<String>, kind: CellKind) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
            kind,
            read_only: false,
            required: false,
            choices: Vec::new(),
            lookup: None,
            derived: None,
        }
    }

    pub fn text(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::base(name, header, CellKind::Text)
    }

    pub fn select(
        name: impl Into<String>,
        header: impl Into<String>,
        choices: Vec<String>,
    ) -> Self {
        let mut spec = Self::base(name, header, CellKind::Select);
        spec.choices = choices;
        spec
    }

    pub fn relationship(
        name: impl Into<String>,
        header: impl Into<String>,
        lookup: LookupTable,
    ) -> Self {
        let mut spec = Self::base(name, header, CellKind::Relationship);
        spec.lookup = Some(lookup);
        spec
    }

    pub fn multi_relationship(
        name: impl Into<String>,
        header: impl Into<String>,
        lookup: LookupTable,
    ) -> Self {
        let mut spec = Self::base(name, header, CellKind::MultiRelationship);
        spec.lookup = Some(lookup);
        spec
    }

    pub fn tri_state(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::base(name, header, CellKind::TriState)
    }

    pub fn date(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::base(name, header, CellKind::Date)
    }

    pub fn structured_list(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::base(name, header, CellKind::StructuredList)
    }

    pub fn decimal(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self::base(name, header, CellKind::Decimal)
    }

    pub fn derived(
        name: impl Into<String>,
        header: impl Into<String>,
        recipe: DerivedSpec,
    ) -> Self {
        let mut spec = Self::base(name, header, CellKind::Derived);
        spec.read_only = true;
        spec.derived = Some(recipe);
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The rejection message for direct edits of this column when derived.
    pub fn derived_edit_rejection(&self) -> String {
        format!(
            "{} is computed automatically and cannot be edited directly",
            self.header
        )
    }

    /// Parse raw text into this column's canonical value.
    ///
    /// Never panics and never refuses to produce a value: parse problems are
    /// carried as the cell-level error while the typed text is retained as a
    /// `Text` value so the operator sees what they entered.
    pub fn parse_input(&self, raw: &str) -> Parsed {
        let trimmed = raw.trim();

        if trimmed.is_empty() && self.kind != CellKind::Derived {
            if self.required {
                return Parsed::problem(Value::Empty, format!("{} is required", self.header));
            }
            return Parsed::ok(Value::Empty);
        }

        match self.kind {
            CellKind::Text => Parsed::ok(Value::Text(trimmed.to_string())),
            CellKind::Select => {
                if self.choices.iter().any(|c| c == trimmed) {
                    Parsed::ok(Value::Text(trimmed.to_string()))
                } else {
                    Parsed::problem(
                        Value::Text(trimmed.to_string()),
                        format!("'{trimmed}' is not an allowed value for {}", self.header),
                    )
                }
            }
            CellKind::Relationship => match self.resolve_token(trimmed) {
                Some(target) => Parsed::ok(Value::Reference(target)),
                None => Parsed::problem(
                    Value::Text(trimmed.to_string()),
                    format!("'{trimmed}' does not match any {}", self.header),
                ),
            },
            CellKind::MultiRelationship => {
                let mut resolved = Vec::new();
                let mut unresolved = Vec::new();
                for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    match self.resolve_token(token) {
                        Some(target) => resolved.push(target),
                        None => unresolved.push(token.to_string()),
                    }
                }
                let value = Value::References(resolved);
                if unresolved.is_empty() {
                    Parsed::ok(value)
                } else {
                    let listed = unresolved.join("', '");
                    Parsed::problem(
                        value,
                        format!("'{listed}' does not match any {}", self.header),
                    )
                }
            }
            CellKind::TriState => match trimmed.to_ascii_lowercase().as_str() {
                "yes" | "y" | "true" | "1" => Parsed::ok(Value::Tri(Some(true))),
                "no" | "n" | "false" | "0" => Parsed::ok(Value::Tri(Some(false))),
                _ => Parsed::problem(
                    Value::Text(trimmed.to_string()),
                    format!("'{trimmed}' is not a yes/no value"),
                ),
            },
            // Accepted as-is; calendar normalization happens downstream.
            CellKind::Date => Parsed::ok(Value::Date(trimmed.to_string())),
            CellKind::StructuredList => match parse_string_list(trimmed) {
                Ok(items) => Parsed::ok(Value::List(items)),
                Err(reason) => Parsed::problem(Value::Text(trimmed.to_string()), reason),
            },
            CellKind::Decimal => {
                let normalized = trimmed.strip_prefix('+').unwrap_or(trimmed);
                match normalized.parse::<f64>() {
                    Ok(n) => Parsed::ok(Value::Decimal(n)),
                    Err(_) => Parsed::problem(
                        Value::Text(trimmed.to_string()),
                        format!("'{trimmed}' is not a valid number"),
                    ),
                }
            }
            CellKind::Derived => Parsed::problem(Value::Empty, self.derived_edit_rejection()),
        }
    }

    /// Canonical display text for a value in this column.
    pub fn format_value(&self, value: &Value) -> String {
        match (self.kind, value) {
            // Free-text dates echo exactly what was supplied.
            (CellKind::Date, Value::Date(s)) => s.clone(),
            _ => value.display(),
        }
    }

    fn resolve_token(&self, token: &str) -> Option<RefTarget> {
        self.lookup.as_ref().and_then(|l| l.resolve(token))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered column set for one model, with normalized-name lookup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    columns: Vec<ColumnSpec>,
    /// Normalized field name and normalized header, each -> column position.
    index: FxHashMap<String, usize>,
    identifier: String,
}

impl SchemaRegistry {
    /// Build a registry, validating column references up front.
    ///
    /// `identifier` names the unique-identifier column used for cross-row
    /// uniqueness checks and import binding.
    pub fn new(columns: Vec<ColumnSpec>, identifier: &str) -> Result<Self, SchemaError> {
        let mut index = FxHashMap::default();
        for (pos, column) in columns.iter().enumerate() {
            for key in [normalize_name(&column.name), normalize_name(&column.header)] {
                if let Some(&existing) = index.get(&key) {
                    if existing != pos {
                        return Err(SchemaError::DuplicateColumn(column.name.clone()));
                    }
                }
                index.insert(key, pos);
            }
        }

        for column in &columns {
            match (&column.kind, &column.derived) {
                (CellKind::Derived, None) => {
                    return Err(SchemaError::MissingDerivedRecipe(column.name.clone()))
                }
                (CellKind::Derived, Some(recipe)) => {
                    for source in &recipe.sources {
                        if !index.contains_key(&normalize_name(source)) {
                            return Err(SchemaError::UnknownDerivedSource {
                                column: column.name.clone(),
                                source: source.clone(),
                            });
                        }
                    }
                    if let Some(quoted) = &recipe.quoted {
                        if !recipe.sources.contains(quoted) {
                            return Err(SchemaError::QuotedNotASource {
                                column: column.name.clone(),
                                source: quoted.clone(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        let identifier = match index.get(&normalize_name(identifier)) {
            Some(&pos) => columns[pos].name.clone(),
            None => return Err(SchemaError::UnknownColumn(identifier.to_string())),
        };

        Ok(Self {
            columns,
            index,
            identifier,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Look up a column by field name or display header, case-insensitively
    /// and with surrounding/internal whitespace normalized.
    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.index
            .get(&normalize_name(name))
            .map(|&pos| &self.columns[pos])
    }

    /// Canonical field name of the identifier column.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Derived columns that declare `source` as an input, in column order.
    pub fn derived_dependents(&self, source: &str) -> Vec<&ColumnSpec> {
        let source = normalize_name(source);
        self.columns
            .iter()
            .filter(|c| {
                c.derived
                    .as_ref()
                    .is_some_and(|d| d.sources.iter().any(|s| normalize_name(s) == source))
            })
            .collect()
    }
}

/// Case-insensitive, whitespace-collapsed form used for column matching.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
