//! Readers over materialized query results
//!
//! Results are computed when the reader is opened; reading never touches
//! the store again. The cursor is the key path of the last record read and
//! can be passed to `QueryBuilder::start_from` to resume.

use crate::eval::ProjectedRow;
use dal_api::Reader;
use dal_core::{DalError, DalResult, Record};
use dal_recordset::{ColumnarRecordset, Recordset, RecordsetReader, Row};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Reading,
    Closed,
}

impl State {
    fn check_cursor(self) -> DalResult<()> {
        match self {
            State::NotStarted => Err(DalError::ReaderNotStarted),
            State::Closed => Err(DalError::ReaderClosed),
            State::Reading => Ok(()),
        }
    }
}

/// Record reader of the in-memory adapter
#[derive(Debug)]
pub struct MemoryReader {
    records: VecDeque<Record>,
    last_path: Option<String>,
    state: State,
}

impl MemoryReader {
    /// Reader yielding `records` in order
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
            last_path: None,
            state: State::NotStarted,
        }
    }
}

impl Reader for MemoryReader {
    fn next_record(&mut self) -> DalResult<Record> {
        if self.state == State::Closed {
            return Err(DalError::ReaderClosed);
        }
        self.state = State::Reading;
        let record = self.records.pop_front().ok_or(DalError::NoMoreRecords)?;
        self.last_path = Some(record.key().path());
        Ok(record)
    }

    fn cursor(&self) -> DalResult<String> {
        self.state.check_cursor()?;
        self.last_path
            .clone()
            .ok_or_else(|| DalError::not_supported("cursor of an empty result"))
    }

    fn close(&mut self) -> DalResult<()> {
        self.state = State::Closed;
        self.records.clear();
        Ok(())
    }
}

/// Recordset reader of the in-memory adapter
///
/// Each `next_row` appends one row; columns the projected row lacks keep
/// their default value.
#[derive(Debug)]
pub struct MemoryRecordsetReader {
    recordset: ColumnarRecordset,
    rows: VecDeque<(Option<String>, ProjectedRow)>,
    last_path: Option<String>,
    state: State,
}

impl MemoryRecordsetReader {
    /// Reader filling `recordset` from `rows`; each row carries the key path
    /// it came from, if any
    pub fn new(recordset: ColumnarRecordset, rows: Vec<(Option<String>, ProjectedRow)>) -> Self {
        Self {
            recordset,
            rows: rows.into(),
            last_path: None,
            state: State::NotStarted,
        }
    }
}

impl RecordsetReader for MemoryRecordsetReader {
    fn recordset(&self) -> &dyn Recordset {
        &self.recordset
    }

    fn next_row(&mut self) -> DalResult<Row> {
        if self.state == State::Closed {
            return Err(DalError::ReaderClosed);
        }
        self.state = State::Reading;
        let (path, mut values) = self.rows.pop_front().ok_or(DalError::NoMoreRecords)?;
        // Type-check every value first so a mismatch leaves no partial row
        let mut assignments = Vec::with_capacity(values.len());
        for index in 0..self.recordset.columns_count() {
            let column = match self.recordset.column(index) {
                Some(column) => column,
                None => continue,
            };
            if let Some(value) = values.remove(column.name()) {
                if !value.is_null() {
                    column
                        .check_value(&value)
                        .map_err(|e| e.context(format!("column {:?}", column.name())))?;
                    assignments.push((index, value));
                }
            }
        }
        let row = self.recordset.new_row()?;
        for (index, value) in assignments {
            row.set_value_by_index(&mut self.recordset, index, value)?;
        }
        self.last_path = path;
        Ok(row)
    }

    fn cursor(&self) -> DalResult<String> {
        self.state.check_cursor()?;
        self.last_path
            .clone()
            .ok_or_else(|| DalError::not_supported("cursor of an aggregate result"))
    }

    fn close(&mut self) -> DalResult<()> {
        self.state = State::Closed;
        self.rows.clear();
        Ok(())
    }
}
