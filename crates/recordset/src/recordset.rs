//! Column-first record sets
//!
//! Every column of a recordset has the same number of rows. Rows are not
//! objects: a [`Row`] is a cursor-style handle holding just the row index,
//! resolved against the recordset on each access.

use crate::column::Column;
use dal_core::{DalError, DalResult, Value};
use std::collections::HashSet;
use std::fmt;

/// Result set stored column by column
pub trait Recordset: Send + Sync {
    /// Number of columns
    fn columns_count(&self) -> usize;

    /// Column at `index`, in insertion order
    fn column(&self, index: usize) -> Option<&dyn Column>;

    /// Position of the column called `name`
    fn column_index(&self, name: &str) -> Option<usize>;

    /// Number of rows
    fn rows_count(&self) -> usize;

    /// Append a default-filled row to every column
    fn new_row(&mut self) -> DalResult<Row>;

    /// Handle to row `index`, or `None` past the end
    fn get_row(&self, index: usize) -> Option<Row>;

    /// Value at (`row`, `column`)
    fn get_value(&self, row: usize, column: usize) -> DalResult<Value>;

    /// Overwrite the value at (`row`, `column`)
    fn set_value(&mut self, row: usize, column: usize, value: Value) -> DalResult<()>;
}

/// [`Recordset`] over a list of untyped columns
pub struct ColumnarRecordset {
    columns: Vec<Box<dyn Column>>,
}

impl ColumnarRecordset {
    /// Recordset over `columns`
    ///
    /// Fails when two columns share a name or their row counts differ.
    pub fn new(columns: Vec<Box<dyn Column>>) -> DalResult<Self> {
        let mut names = HashSet::new();
        for c in &columns {
            if !names.insert(c.name().to_string()) {
                return Err(DalError::invalid_argument(format!(
                    "duplicate column name {:?}",
                    c.name()
                )));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.rows_count();
            if let Some(c) = columns.iter().find(|c| c.rows_count() != rows) {
                return Err(DalError::invalid_argument(format!(
                    "column {:?} has {} rows, expected {}",
                    c.name(),
                    c.rows_count(),
                    rows
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Empty recordset with the same column layout
    pub fn empty_clone(&self) -> ColumnarRecordset {
        ColumnarRecordset {
            columns: self.columns.iter().map(|c| c.empty_clone()).collect(),
        }
    }

    /// Append a row from values in column order
    pub fn push_row(&mut self, values: Vec<Value>) -> DalResult<Row> {
        if values.len() != self.columns.len() {
            return Err(DalError::invalid_argument(format!(
                "row has {} values, recordset has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        let row = self.new_row()?;
        for (i, v) in values.into_iter().enumerate() {
            self.set_value(row.index(), i, v)?;
        }
        Ok(row)
    }

    fn column_at(&self, index: usize) -> DalResult<&dyn Column> {
        self.column(index).ok_or_else(|| {
            DalError::invalid_argument(format!(
                "column {} out of range, recordset has {} columns",
                index,
                self.columns.len()
            ))
        })
    }
}

impl Recordset for ColumnarRecordset {
    fn columns_count(&self) -> usize {
        self.columns.len()
    }

    fn column(&self, index: usize) -> Option<&dyn Column> {
        self.columns.get(index).map(|c| c.as_ref())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    fn rows_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.rows_count())
    }

    fn new_row(&mut self) -> DalResult<Row> {
        let index = self.rows_count();
        for c in self.columns.iter_mut() {
            c.add_default()?;
        }
        Ok(Row { index })
    }

    fn get_row(&self, index: usize) -> Option<Row> {
        (index < self.rows_count()).then_some(Row { index })
    }

    fn get_value(&self, row: usize, column: usize) -> DalResult<Value> {
        self.column_at(column)?.get_value(row)
    }

    fn set_value(&mut self, row: usize, column: usize, value: Value) -> DalResult<()> {
        let count = self.columns.len();
        let c = self.columns.get_mut(column).ok_or_else(|| {
            DalError::invalid_argument(format!(
                "column {} out of range, recordset has {} columns",
                column, count
            ))
        })?;
        c.set_value(row, value)
    }
}

impl fmt::Debug for ColumnarRecordset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnarRecordset")
            .field("columns", &self.column_names())
            .field("rows", &self.rows_count())
            .finish()
    }
}

/// Handle to one row of a recordset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Row {
    index: usize,
}

impl Row {
    /// Row position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of column `column`
    pub fn get_value_by_index(&self, rs: &dyn Recordset, column: usize) -> DalResult<Value> {
        rs.get_value(self.index, column)
    }

    /// Value of the column called `name`
    pub fn get_value_by_name(&self, rs: &dyn Recordset, name: &str) -> DalResult<Value> {
        rs.get_value(self.index, column_by_name(rs, name)?)
    }

    /// Overwrite column `column`
    pub fn set_value_by_index(
        &self,
        rs: &mut dyn Recordset,
        column: usize,
        value: impl Into<Value>,
    ) -> DalResult<()> {
        rs.set_value(self.index, column, value.into())
    }

    /// Overwrite the column called `name`
    pub fn set_value_by_name(
        &self,
        rs: &mut dyn Recordset,
        name: &str,
        value: impl Into<Value>,
    ) -> DalResult<()> {
        let column = column_by_name(rs, name)?;
        rs.set_value(self.index, column, value.into())
    }

    /// All values of the row, in column order
    pub fn data(&self, rs: &dyn Recordset) -> DalResult<Vec<Value>> {
        (0..rs.columns_count())
            .map(|c| rs.get_value(self.index, c))
            .collect()
    }
}

fn column_by_name(rs: &dyn Recordset, name: &str) -> DalResult<usize> {
    rs.column_index(name)
        .ok_or_else(|| DalError::invalid_argument(format!("unknown column {:?}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{bitmap, boolean, dense};
    use proptest::prelude::*;

    fn users() -> ColumnarRecordset {
        ColumnarRecordset::new(vec![
            dense("name", String::new()),
            bitmap("city", String::from("Paris")),
            boolean("active", false),
        ])
        .unwrap()
    }

    #[test]
    fn new_row_is_default_filled() {
        let mut rs = users();
        let row = rs.new_row().unwrap();
        assert_eq!(rs.rows_count(), 1);
        assert_eq!(
            row.data(&rs).unwrap(),
            vec![Value::from(""), Value::from("Paris"), Value::Bool(false)]
        );
    }

    #[test]
    fn set_and_get_by_name_and_index() {
        let mut rs = users();
        let row = rs.new_row().unwrap();
        row.set_value_by_name(&mut rs, "name", "Ann").unwrap();
        row.set_value_by_index(&mut rs, 2, true).unwrap();
        assert_eq!(row.get_value_by_name(&rs, "name").unwrap(), Value::from("Ann"));
        assert_eq!(row.get_value_by_index(&rs, 2).unwrap(), Value::Bool(true));
        assert!(row.get_value_by_name(&rs, "missing").is_err());
        assert!(row.set_value_by_name(&mut rs, "active", "yes").is_err());
    }

    #[test]
    fn get_row_past_end_is_none() {
        let mut rs = users();
        rs.new_row().unwrap();
        assert!(rs.get_row(0).is_some());
        assert!(rs.get_row(1).is_none());
    }

    #[test]
    fn columns_are_ordered_by_insertion() {
        let rs = users();
        assert_eq!(rs.column_names(), vec!["name", "city", "active"]);
        assert_eq!(rs.column_index("city"), Some(1));
        assert!(rs.column(3).is_none());
    }

    #[test]
    fn rejects_duplicate_names_and_uneven_columns() {
        assert!(ColumnarRecordset::new(vec![dense("a", 0i64), dense("a", 0i64)]).is_err());

        let mut filled = dense("a", 0i64);
        filled.add_default().unwrap();
        assert!(ColumnarRecordset::new(vec![filled, dense("b", 0i64)]).is_err());
    }

    #[test]
    fn push_row_checks_arity() {
        let mut rs = users();
        rs.push_row(vec![Value::from("Bo"), Value::from("Oslo"), Value::Bool(true)])
            .unwrap();
        assert!(rs.push_row(vec![Value::from("x")]).is_err());
        assert_eq!(rs.rows_count(), 1);
        assert_eq!(rs.empty_clone().rows_count(), 0);
    }

    proptest! {
        #[test]
        fn all_columns_keep_the_same_row_count(ops in proptest::collection::vec(0usize..3, 0..40)) {
            let mut rs = users();
            for op in ops {
                let row = rs.new_row().unwrap();
                let _ = row.set_value_by_index(&mut rs, op, Value::from("v"));
            }
            let rows = rs.rows_count();
            for c in 0..rs.columns_count() {
                prop_assert_eq!(rs.column(c).unwrap().rows_count(), rows);
            }
        }
    }
}
