//! Structured query evaluation over stored records
//!
//! Pipeline: source filter, WHERE, ORDER BY (ties broken by key path),
//! start cursor, OFFSET, LIMIT. Projection then turns the surviving rows
//! into records or column values.
//!
//! Supported: collections (optionally under a parent key), collection
//! groups, comparisons, IN, AND/OR, key id references, dotted field paths
//! and the aggregates COUNT, SUM, MIN, MAX and AVG without GROUP BY.
//! Joins and GROUP BY are `NotSupported`.

use crate::store::StoredRecord;
use chrono::{DateTime, Utc};
use dal_core::{Context, DalError, DalResult, JsonMap, Key, KeyId, Record, Value};
use dal_query::{
    Column, Comparison, Condition, Expression, FieldRef, FromSource, GroupOperator, Operator,
    Query, RecordsetSource,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Projected row: output column name to value
pub type ProjectedRow = BTreeMap<String, Value>;

/// True when a record with `key` belongs to `source`
pub fn matches_source(source: &FromSource, key: &Key) -> DalResult<bool> {
    if !source.joins().is_empty() {
        return Err(DalError::not_supported("joins"));
    }
    Ok(match source.source() {
        RecordsetSource::Collection(c) => {
            key.collection() == c.name()
                && match (c.parent(), key.parent()) {
                    (Some(expected), Some(actual)) => expected.as_ref() == actual,
                    (None, None) => true,
                    _ => false,
                }
        }
        RecordsetSource::CollectionGroup(g) => key.collection() == g.name(),
    })
}

/// Filter, order and page `rows` as `query` asks
///
/// `rows` must come in key path order. Paging is skipped for aggregate
/// queries, which page their single result row instead.
pub fn select_rows(query: &Query, rows: Vec<StoredRecord>) -> DalResult<Vec<StoredRecord>> {
    if !query.group_by().is_empty() {
        return Err(DalError::not_supported("GROUP BY"));
    }
    let source = match query.from_source() {
        Some(source) => source,
        None => return Ok(Vec::new()),
    };

    let mut selected = Vec::new();
    for row in rows {
        if !matches_source(source, &row.key)? {
            continue;
        }
        if let Some(condition) = query.condition() {
            if !evaluate_condition(condition, &row)? {
                continue;
            }
        }
        selected.push(row);
    }

    if !query.order_by().is_empty() {
        let mut keyed = Vec::with_capacity(selected.len());
        for row in selected {
            let sort_key = query
                .order_by()
                .iter()
                .map(|o| evaluate(o.expression(), &row))
                .collect::<DalResult<Vec<Value>>>()?;
            keyed.push((sort_key, row));
        }
        keyed.sort_by(|(a, ra), (b, rb)| {
            for ((x, y), order) in a.iter().zip(b).zip(query.order_by()) {
                let ord = sort_cmp(x, y);
                if ord != Ordering::Equal {
                    return if order.is_descending() { ord.reverse() } else { ord };
                }
            }
            ra.key.path().cmp(&rb.key.path())
        });
        selected = keyed.into_iter().map(|(_, row)| row).collect();
    }

    if let Some(cursor) = query.start_cursor() {
        match selected.iter().position(|r| r.key.path() == cursor) {
            Some(i) => {
                selected.drain(..=i);
            }
            None => {
                return Err(DalError::invalid_argument(format!(
                    "unknown start cursor {:?}",
                    cursor
                )))
            }
        }
    }

    if is_aggregate(query) {
        return Ok(selected);
    }
    Ok(page(selected, query.offset(), query.limit()))
}

fn page<T>(rows: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    let rows = rows.into_iter().skip(offset);
    if limit == 0 {
        rows.collect()
    } else {
        rows.take(limit).collect()
    }
}

/// True when the query selects aggregate functions
pub fn is_aggregate(query: &Query) -> bool {
    query
        .columns()
        .iter()
        .any(|c| matches!(c.expression(), Expression::Function { .. }))
}

/// Build the record the query yields for `row`
///
/// Keys-only queries yield records with an empty payload; queries with a
/// data factory load the stored data into a fresh payload and run the
/// `after_load` hook; column queries carry the projected columns as a JSON
/// object.
pub fn to_record(ctx: &Context, query: &Query, row: &StoredRecord) -> DalResult<Record> {
    let mut record = if let Some(factory) = query.data_factory() {
        let mut data = factory();
        data.load_json(row.data.clone())?;
        let mut record = Record::with_boxed_data(row.key.clone(), data);
        dal_core::entity::after_load(ctx, &mut record)?;
        record
    } else if !query.columns().is_empty() {
        let mut map = JsonMap::new();
        for column in query.columns() {
            map.insert(column.output_name(), evaluate(column.expression(), row)?.to_json());
        }
        Record::with_data(row.key.clone(), map)
    } else {
        Record::new(row.key.clone())
    };
    record.set_error(None);
    Ok(record)
}

/// Project `rows` onto the query columns
///
/// Queries without columns project the key id as `$id`. Aggregate queries
/// collapse all rows into one; a query without a source evaluates its
/// columns once.
pub fn project(query: &Query, rows: &[StoredRecord]) -> DalResult<Vec<ProjectedRow>> {
    let columns = query.columns();
    if query.from_source().is_none() {
        let mut row = ProjectedRow::new();
        for column in columns {
            row.insert(column.output_name(), evaluate_constant(column.expression())?);
        }
        return Ok(vec![row]);
    }
    if is_aggregate(query) {
        let row = aggregate_row(columns, rows)?;
        return Ok(page(vec![row], query.offset(), query.limit()));
    }
    rows.iter()
        .map(|row| -> DalResult<ProjectedRow> {
            if columns.is_empty() {
                let mut projected = ProjectedRow::new();
                projected.insert("$id".to_string(), key_id_value(row.key.id()));
                return Ok(projected);
            }
            columns
                .iter()
                .map(|c| evaluate(c.expression(), row).map(|v| (c.output_name(), v)))
                .collect()
        })
        .collect()
}

fn aggregate_row(columns: &[Column], rows: &[StoredRecord]) -> DalResult<ProjectedRow> {
    let mut projected = ProjectedRow::new();
    for column in columns {
        let value = match column.expression() {
            Expression::Function { name, args } => aggregate(name, args, rows)?,
            other => {
                return Err(DalError::invalid_argument(format!(
                    "column {} must be aggregated or grouped",
                    other
                )))
            }
        };
        projected.insert(column.output_name(), value);
    }
    Ok(projected)
}

fn aggregate(name: &str, args: &[Expression], rows: &[StoredRecord]) -> DalResult<Value> {
    let arg = match args {
        [arg] => arg,
        _ => {
            return Err(DalError::invalid_argument(format!(
                "{} takes exactly one argument",
                name
            )))
        }
    };
    if name == "COUNT" && matches!(arg.as_field_ref(), Some(f) if f.name() == "*") {
        return Ok(Value::Int(rows.len() as i64));
    }
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let v = evaluate(arg, row)?;
        if !v.is_null() {
            values.push(v);
        }
    }
    Ok(match name {
        "COUNT" => Value::Int(values.len() as i64),
        "SUM" => sum(&values)?,
        "AVG" if values.is_empty() => Value::Null,
        "AVG" => match sum(&values)? {
            Value::Int(total) => Value::Float(total as f64 / values.len() as f64),
            Value::Float(total) => Value::Float(total / values.len() as f64),
            _ => Value::Null,
        },
        "MIN" => values.into_iter().min_by(sort_cmp).unwrap_or(Value::Null),
        "MAX" => values.into_iter().max_by(sort_cmp).unwrap_or(Value::Null),
        other => return Err(DalError::not_supported(format!("function {}", other))),
    })
}

fn sum(values: &[Value]) -> DalResult<Value> {
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut is_float = false;
    for v in values {
        match v {
            Value::Int(i) => {
                int_total = int_total
                    .checked_add(*i)
                    .ok_or_else(|| DalError::invalid_argument("SUM overflows i64"))?;
            }
            Value::Float(f) => {
                float_total += f;
                is_float = true;
            }
            other => {
                return Err(DalError::invalid_argument(format!(
                    "cannot sum a {}",
                    other.type_name()
                )))
            }
        }
    }
    Ok(if is_float {
        Value::Float(float_total + int_total as f64)
    } else {
        Value::Int(int_total)
    })
}

fn evaluate_constant(expr: &Expression) -> DalResult<Value> {
    match expr {
        Expression::Constant(v) => Ok(v.clone()),
        Expression::Array(values) => Ok(Value::Array(values.clone())),
        other => Err(DalError::invalid_argument(format!(
            "{} needs a source to select from",
            other
        ))),
    }
}

/// Value of `expr` for `row`; missing fields read as `Null`
pub fn evaluate(expr: &Expression, row: &StoredRecord) -> DalResult<Value> {
    match expr {
        Expression::FieldRef(f) => Ok(field_value(row, f)),
        Expression::Constant(v) => Ok(v.clone()),
        Expression::Array(values) => Ok(Value::Array(values.clone())),
        Expression::Function { name, .. } => {
            Err(DalError::not_supported(format!("function {} in expression", name)))
        }
    }
}

/// Value of a field or key id reference for `row`
pub fn field_value(row: &StoredRecord, field: &FieldRef) -> Value {
    if field.is_id() {
        return key_id_value(row.key.id());
    }
    let mut current = &row.data;
    for component in field.name().split('.') {
        match current.get(component) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    Value::from(current.clone())
}

/// Key id as a dynamic value
pub fn key_id_value(id: &KeyId) -> Value {
    match id {
        KeyId::None => Value::Null,
        KeyId::Int(i) => Value::Int(*i),
        KeyId::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// True when `row` satisfies `condition`
pub fn evaluate_condition(condition: &Condition, row: &StoredRecord) -> DalResult<bool> {
    match condition {
        Condition::Comparison(c) => evaluate_comparison(c, row),
        Condition::Group(g) => {
            let results = g.conditions().iter().map(|c| evaluate_condition(c, row));
            match g.operator() {
                GroupOperator::And => {
                    for r in results {
                        if !r? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                GroupOperator::Or => {
                    for r in results {
                        if r? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        }
    }
}

fn evaluate_comparison(comparison: &Comparison, row: &StoredRecord) -> DalResult<bool> {
    let left = evaluate(comparison.left(), row)?;
    let right = evaluate(comparison.right(), row)?;
    let ord = || compare_values(&left, &right);
    Ok(match comparison.operator() {
        Operator::Equal => ord() == Some(Ordering::Equal),
        Operator::GreaterThan => ord() == Some(Ordering::Greater),
        Operator::GreaterOrEqual => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
        Operator::LessThan => ord() == Some(Ordering::Less),
        Operator::LessOrEqual => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
        Operator::In => match right.as_array() {
            Some(candidates) => candidates
                .iter()
                .any(|c| compare_values(&left, c) == Some(Ordering::Equal)),
            None => false,
        },
    })
}

/// Ordering of two values of comparable types
///
/// Numbers compare exactly across `Int`/`Float`; a time compares with an RFC 3339
/// string, which is how stored data carries times. Other mixed types are
/// incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => cmp_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => cmp_int_float(*y, *x).map(Ordering::reverse),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::String(y)) => parse_time(y).map(|y| x.cmp(&y)),
        (Value::String(x), Value::Time(y)) => parse_time(x).map(|x| x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (a, b) in x.iter().zip(y) {
                match compare_values(a, b)? {
                    Ordering::Equal => {}
                    ord => return Some(ord),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

/// Exact comparison of an integer with a float; `None` for NaN
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, the first float above every i64
    const I64_END: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= I64_END {
        return Some(Ordering::Less);
    }
    if f < -I64_END {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    // In range, so the cast is exact
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)),
        ord => Some(ord),
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Time(_) => 3,
        Value::String(_) => 4,
        Value::Bytes(_) => 5,
        Value::Array(_) => 6,
        Value::Object(_) => 7,
    }
}

fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Float(f) if f.is_nan())
}

/// Total order used for sorting
///
/// Values of different types order by type. Within a type, comparable
/// values order by value, NaN sorts after every other number, and arrays
/// and objects compare element by element.
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(a, b)| sort_cmp(a, b))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| sort_cmp(va, vb)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => compare_values(a, b).unwrap_or_else(|| is_nan(a).cmp(&is_nan(b))),
    }
}
