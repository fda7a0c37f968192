//! Columnar record sets
//!
//! Results are stored column-first: dense columns keep one slot per row,
//! bitmap columns keep a roaring bitmap of rows per distinct value, and
//! boolean columns keep a single bitmap of `true` rows.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod column;
pub mod reader;
pub mod recordset;

pub use column::{
    bitmap, boolean, dense, BitmapColumn, BoolColumn, Column, ColumnValue, DenseColumn,
    TypedColumn, Untyped,
};
pub use reader::{read_all_rows, RecordsetOptions, RecordsetReader};
pub use recordset::{ColumnarRecordset, Recordset, Row};
