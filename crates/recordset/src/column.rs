//! Typed columns and their untyped wrapper
//!
//! Three storage layouts:
//! - [`DenseColumn`]: one slot per row
//! - [`BitmapColumn`]: one roaring bitmap of row indices per distinct value,
//!   compact when values repeat
//! - [`BoolColumn`]: a single bitmap of the rows holding `true`
//!
//! Recordsets hold columns as `Box<dyn Column>`; [`Untyped`] adapts any
//! typed column to that interface and rejects values of the wrong type.

use chrono::{DateTime, Utc};
use dal_core::{DalError, DalResult, Value};
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

/// Row index inside a roaring bitmap
pub type RowId = u32;

fn row_id(row: usize) -> DalResult<RowId> {
    RowId::try_from(row)
        .map_err(|_| DalError::invalid_argument(format!("row index {} exceeds bitmap range", row)))
}

fn out_of_range(column: &str, row: usize, rows: usize) -> DalError {
    DalError::invalid_argument(format!(
        "row {} out of range for column {:?} with {} rows",
        row, column, rows
    ))
}

/// Element type a column can store
pub trait ColumnValue: Clone + Send + Sync + 'static {
    /// Type name used in mismatch errors
    const TYPE_NAME: &'static str;

    /// Convert to the dynamic value
    fn to_value(&self) -> Value;

    /// Convert from the dynamic value; `None` on type mismatch
    fn from_value(value: &Value) -> Option<Self>;
}

impl ColumnValue for String {
    const TYPE_NAME: &'static str = "String";

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ColumnValue for i64 {
    const TYPE_NAME: &'static str = "Int";

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl ColumnValue for f64 {
    const TYPE_NAME: &'static str = "Float";

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl ColumnValue for bool {
    const TYPE_NAME: &'static str = "Bool";

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ColumnValue for DateTime<Utc> {
    const TYPE_NAME: &'static str = "Time";

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_time()
    }
}

impl ColumnValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Column storing values of one static type
pub trait TypedColumn<T: ColumnValue>: Send + Sync {
    /// Column name
    fn name(&self) -> &str;

    /// Value a new row starts with
    fn default_value(&self) -> T;

    /// Number of rows
    fn rows_count(&self) -> usize;

    /// Append a row
    fn add(&mut self, value: T) -> DalResult<()>;

    /// Value at `row`
    fn get(&self, row: usize) -> DalResult<T>;

    /// Overwrite the value at `row`
    fn set(&mut self, row: usize, value: T) -> DalResult<()>;

    /// All values in row order
    fn values(&self) -> Vec<T>;

    /// Column with the same name and default but no rows
    fn empty(&self) -> Self
    where
        Self: Sized;
}

/// Column backed by one slot per row
#[derive(Debug, Clone)]
pub struct DenseColumn<T> {
    name: String,
    default: T,
    values: Vec<T>,
}

impl<T: ColumnValue> DenseColumn<T> {
    /// Empty column
    pub fn new(name: impl Into<String>, default: T) -> Self {
        Self {
            name: name.into(),
            default,
            values: Vec::new(),
        }
    }

    /// Stored values in row order, without copying
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

impl<T: ColumnValue> TypedColumn<T> for DenseColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> T {
        self.default.clone()
    }

    fn rows_count(&self) -> usize {
        self.values.len()
    }

    fn add(&mut self, value: T) -> DalResult<()> {
        self.values.push(value);
        Ok(())
    }

    fn get(&self, row: usize) -> DalResult<T> {
        self.values
            .get(row)
            .cloned()
            .ok_or_else(|| out_of_range(&self.name, row, self.values.len()))
    }

    fn set(&mut self, row: usize, value: T) -> DalResult<()> {
        let rows = self.values.len();
        let slot = self
            .values
            .get_mut(row)
            .ok_or_else(|| out_of_range(&self.name, row, rows))?;
        *slot = value;
        Ok(())
    }

    fn values(&self) -> Vec<T> {
        self.values.clone()
    }

    fn empty(&self) -> Self {
        Self::new(self.name.clone(), self.default.clone())
    }
}

/// Column storing a bitmap of rows per distinct value
#[derive(Debug, Clone)]
pub struct BitmapColumn<T: Eq + Hash> {
    name: String,
    default: T,
    bitmaps: HashMap<T, RoaringBitmap>,
    rows: usize,
}

impl<T: ColumnValue + Eq + Hash> BitmapColumn<T> {
    /// Empty column
    pub fn new(name: impl Into<String>, default: T) -> Self {
        Self {
            name: name.into(),
            default,
            bitmaps: HashMap::new(),
            rows: 0,
        }
    }

    /// Number of distinct values stored
    pub fn distinct_count(&self) -> usize {
        self.bitmaps.len()
    }

    /// Rows holding `value`
    pub fn rows_with(&self, value: &T) -> Option<&RoaringBitmap> {
        self.bitmaps.get(value)
    }

    fn remove_row(&mut self, id: RowId) {
        let mut emptied = None;
        for (value, bitmap) in self.bitmaps.iter_mut() {
            if bitmap.remove(id) {
                if bitmap.is_empty() {
                    emptied = Some(value.clone());
                }
                break;
            }
        }
        if let Some(value) = emptied {
            self.bitmaps.remove(&value);
        }
    }
}

impl<T: ColumnValue + Eq + Hash> TypedColumn<T> for BitmapColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> T {
        self.default.clone()
    }

    fn rows_count(&self) -> usize {
        self.rows
    }

    fn add(&mut self, value: T) -> DalResult<()> {
        let id = row_id(self.rows)?;
        self.bitmaps.entry(value).or_default().insert(id);
        self.rows += 1;
        Ok(())
    }

    fn get(&self, row: usize) -> DalResult<T> {
        if row >= self.rows {
            return Err(out_of_range(&self.name, row, self.rows));
        }
        let id = row_id(row)?;
        self.bitmaps
            .iter()
            .find(|(_, bitmap)| bitmap.contains(id))
            .map(|(value, _)| value.clone())
            .ok_or_else(|| DalError::internal(format!("row {} missing from column {:?}", row, self.name)))
    }

    fn set(&mut self, row: usize, value: T) -> DalResult<()> {
        if row >= self.rows {
            return Err(out_of_range(&self.name, row, self.rows));
        }
        let id = row_id(row)?;
        self.remove_row(id);
        self.bitmaps.entry(value).or_default().insert(id);
        Ok(())
    }

    fn values(&self) -> Vec<T> {
        let mut values = vec![self.default.clone(); self.rows];
        for (value, bitmap) in &self.bitmaps {
            for id in bitmap.iter() {
                values[id as usize] = value.clone();
            }
        }
        values
    }

    fn empty(&self) -> Self {
        Self::new(self.name.clone(), self.default.clone())
    }
}

/// Boolean column storing the bitmap of rows holding `true`
#[derive(Debug, Clone, Default)]
pub struct BoolColumn {
    name: String,
    default: bool,
    trues: RoaringBitmap,
    rows: usize,
}

impl BoolColumn {
    /// Empty column
    pub fn new(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            default,
            trues: RoaringBitmap::new(),
            rows: 0,
        }
    }

    /// Rows holding `true`
    pub fn true_rows(&self) -> &RoaringBitmap {
        &self.trues
    }
}

impl TypedColumn<bool> for BoolColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self) -> bool {
        self.default
    }

    fn rows_count(&self) -> usize {
        self.rows
    }

    fn add(&mut self, value: bool) -> DalResult<()> {
        let id = row_id(self.rows)?;
        if value {
            self.trues.insert(id);
        }
        self.rows += 1;
        Ok(())
    }

    fn get(&self, row: usize) -> DalResult<bool> {
        if row >= self.rows {
            return Err(out_of_range(&self.name, row, self.rows));
        }
        Ok(self.trues.contains(row_id(row)?))
    }

    fn set(&mut self, row: usize, value: bool) -> DalResult<()> {
        if row >= self.rows {
            return Err(out_of_range(&self.name, row, self.rows));
        }
        let id = row_id(row)?;
        if value {
            self.trues.insert(id);
        } else {
            self.trues.remove(id);
        }
        Ok(())
    }

    fn values(&self) -> Vec<bool> {
        let mut values = vec![false; self.rows];
        for id in self.trues.iter() {
            values[id as usize] = true;
        }
        values
    }

    fn empty(&self) -> Self {
        Self::new(self.name.clone(), self.default)
    }
}

/// Type-erased column, as held by a recordset
pub trait Column: Send + Sync {
    /// Column name
    fn name(&self) -> &str;

    /// Element type name
    fn value_type(&self) -> &'static str;

    /// Number of rows
    fn rows_count(&self) -> usize;

    /// Default of a new row
    fn default_value(&self) -> Value;

    /// Append a row; fails when `value` has the wrong type
    fn add(&mut self, value: Value) -> DalResult<()>;

    /// Append a default-filled row
    fn add_default(&mut self) -> DalResult<()>;

    /// Value at `row`
    fn get_value(&self, row: usize) -> DalResult<Value>;

    /// Overwrite the value at `row`; fails when `value` has the wrong type
    fn set_value(&mut self, row: usize, value: Value) -> DalResult<()>;

    /// Fail when `value` cannot be stored in this column
    fn check_value(&self, value: &Value) -> DalResult<()>;

    /// Empty column of the same name, type and layout
    fn empty_clone(&self) -> Box<dyn Column>;
}

/// Adapter from a typed column to [`Column`]
pub struct Untyped<T, C> {
    inner: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> Untyped<T, C>
where
    T: ColumnValue,
    C: TypedColumn<T> + 'static,
{
    /// Wrap a typed column
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Wrap and box a typed column
    pub fn boxed(inner: C) -> Box<dyn Column> {
        Box::new(Self::new(inner))
    }

    /// The typed column
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn convert(&self, value: &Value) -> DalResult<T> {
        T::from_value(value).ok_or_else(|| {
            DalError::invalid_argument(format!(
                "column {:?} holds {}, got {}",
                self.inner.name(),
                T::TYPE_NAME,
                value.type_name()
            ))
        })
    }
}

impl<T, C> Column for Untyped<T, C>
where
    T: ColumnValue,
    C: TypedColumn<T> + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn value_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn rows_count(&self) -> usize {
        self.inner.rows_count()
    }

    fn default_value(&self) -> Value {
        self.inner.default_value().to_value()
    }

    fn add(&mut self, value: Value) -> DalResult<()> {
        let v = self.convert(&value)?;
        self.inner.add(v)
    }

    fn add_default(&mut self) -> DalResult<()> {
        let v = self.inner.default_value();
        self.inner.add(v)
    }

    fn get_value(&self, row: usize) -> DalResult<Value> {
        self.inner.get(row).map(|v| v.to_value())
    }

    fn set_value(&mut self, row: usize, value: Value) -> DalResult<()> {
        let v = self.convert(&value)?;
        self.inner.set(row, v)
    }

    fn check_value(&self, value: &Value) -> DalResult<()> {
        self.convert(value).map(|_| ())
    }

    fn empty_clone(&self) -> Box<dyn Column> {
        Untyped::boxed(self.inner.empty())
    }
}

/// Dense column behind the untyped interface
pub fn dense<T: ColumnValue>(name: impl Into<String>, default: T) -> Box<dyn Column> {
    Untyped::boxed(DenseColumn::new(name, default))
}

/// Bitmap column behind the untyped interface
pub fn bitmap<T: ColumnValue + Eq + Hash>(name: impl Into<String>, default: T) -> Box<dyn Column> {
    Untyped::boxed(BitmapColumn::new(name, default))
}

/// Bool bitmap column behind the untyped interface
pub fn boolean(name: impl Into<String>, default: bool) -> Box<dyn Column> {
    Untyped::boxed(BoolColumn::new(name, default))
}
