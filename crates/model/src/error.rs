use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Two columns normalize to the same lookup key.
    DuplicateColumn(String),
    /// A referenced column does not exist in the registry.
    UnknownColumn(String),
    /// A derived column references a source column that does not exist.
    UnknownDerivedSource { column: String, source: String },
    /// The quoted component of a derived column is not one of its sources.
    QuotedNotASource { column: String, source: String },
    /// A column declared derived carries no composition recipe.
    MissingDerivedRecipe(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateColumn(name) => write!(f, "duplicate column: {name}"),
            Self::UnknownColumn(name) => write!(f, "unknown column: {name}"),
            Self::UnknownDerivedSource { column, source } => {
                write!(f, "column '{column}': unknown derived source '{source}'")
            }
            Self::QuotedNotASource { column, source } => {
                write!(f, "column '{column}': quoted component '{source}' is not a source")
            }
            Self::MissingDerivedRecipe(name) => {
                write!(f, "column '{name}': derived column without a recipe")
            }
        }
    }
}

impl std::error::Error for SchemaError {}
