//! Pull-based reading of query results into a recordset

use crate::column::Column;
use crate::recordset::{ColumnarRecordset, Recordset, Row};
use dal_core::{DalError, DalResult};

/// Streams rows into a recordset it owns
///
/// `next_row` appends the next result row and returns its handle, or
/// `NoMoreRecords` at the end. `close` is idempotent.
pub trait RecordsetReader {
    /// Recordset the rows are read into
    fn recordset(&self) -> &dyn Recordset;

    /// Read the next row
    fn next_row(&mut self) -> DalResult<Row>;

    /// Continuation token, if the backend supports one
    fn cursor(&self) -> DalResult<String> {
        Err(DalError::not_supported("recordset cursor"))
    }

    /// Release the underlying stream
    fn close(&mut self) -> DalResult<()>;
}

/// Drain `reader`, returning the number of rows read
///
/// The reader is closed in all cases; a close error is reported only when
/// reading succeeded.
pub fn read_all_rows(reader: &mut dyn RecordsetReader) -> DalResult<usize> {
    let mut count = 0;
    let result = loop {
        match reader.next_row() {
            Ok(_) => count += 1,
            Err(e) if e.is_no_more_records() => break Ok(count),
            Err(e) => break Err(e),
        }
    };
    let closed = reader.close();
    let count = result?;
    closed.map_err(|e| e.context("failed to close recordset reader"))?;
    Ok(count)
}

/// How a recordset reader lays out its columns
#[derive(Default)]
pub struct RecordsetOptions {
    columns: Vec<Box<dyn Column>>,
}

impl RecordsetOptions {
    /// No template: the adapter derives columns from the query
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a template column; its rows, if any, are ignored
    pub fn with_column(mut self, column: Box<dyn Column>) -> Self {
        self.columns.push(column.empty_clone());
        self
    }

    /// True when the caller supplied columns
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Names of the template columns
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Fresh empty recordset with the template columns
    pub fn new_recordset(&self) -> DalResult<ColumnarRecordset> {
        ColumnarRecordset::new(self.columns.iter().map(|c| c.empty_clone()).collect())
    }
}
