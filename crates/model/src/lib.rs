//! `rostergrid-model` — Grid data model: cells, rows, column schema.
//!
//! Pure data crate: no editing logic, no IO. The engine crate is the only
//! mutation path over these types.

pub mod cell;
pub mod error;
pub mod row;
pub mod schema;
pub mod value;

pub use cell::{Cell, Validity};
pub use error::SchemaError;
pub use row::{ConcurrencyToken, RecordSnapshot, Row, RowId};
pub use schema::{
    CellKind, ColumnSpec, DerivedSpec, LookupEntry, LookupTable, Parsed, SchemaRegistry,
};
pub use value::{RefTarget, Value};
