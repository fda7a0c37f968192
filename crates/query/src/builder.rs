//! Fluent query builder
//!
//! ```
//! use dal_query::{from, Operator, ascending};
//! use dal_core::IdKind;
//!
//! let query = from("Users")
//!     .new_query()
//!     .where_field("age", Operator::GreaterOrEqual, 18)
//!     .order_by([ascending("name")])
//!     .limit(10)
//!     .select_keys_only(IdKind::String);
//! assert_eq!(
//!     query.to_string(),
//!     "SELECT TOP 10 * FROM [Users] WHERE age >= 18\nORDER BY name"
//! );
//! ```

use crate::condition::{Comparison, Condition, Operator};
use crate::expression::{validate_array, Expression, FieldRef};
use crate::query::{Column, DataFactory, OrderExpression, Query};
use crate::source::FromSource;
use chrono::{DateTime, Utc};
use dal_core::{DalError, DalResult, Entity, IdKind, RecordData, Value};
use std::sync::Arc;

/// Right-hand side accepted by `QueryBuilder::where_field`
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Plain value: a scalar, a time, or a list for `IN`
    Value(Value),
    /// Prebuilt expression: a constant, field reference or array
    Expression(Expression),
}

impl Operand {
    /// Turn into the right side of a comparison with `op`
    ///
    /// Accepts a scalar (or time), a `Constant`, a `FieldRef`, and a list or
    /// `Array` together with `IN`. A scalar used with `IN` is wrapped into a
    /// one-element array.
    pub fn into_expression(self, op: Operator) -> DalResult<Expression> {
        let value = match self {
            Operand::Value(v) => v,
            Operand::Expression(Expression::Constant(v)) => v,
            Operand::Expression(Expression::FieldRef(f)) if !op.is_group() => {
                return Ok(Expression::FieldRef(f))
            }
            Operand::Expression(Expression::Array(values)) if op.is_group() => {
                validate_array(&values)?;
                return Ok(Expression::Array(values));
            }
            Operand::Expression(other) => {
                return Err(DalError::invalid_argument(format!(
                    "operator {} does not accept {}",
                    op, other
                )))
            }
        };
        match value {
            Value::Array(values) if op.is_group() => {
                validate_array(&values)?;
                Ok(Expression::Array(values))
            }
            Value::Array(_) | Value::Object(_) => Err(DalError::invalid_argument(format!(
                "operator {} does not accept a value of type {}",
                op,
                value.type_name()
            ))),
            scalar if op.is_group() => Ok(Expression::Array(vec![scalar])),
            scalar => Ok(Expression::Constant(scalar)),
        }
    }
}

macro_rules! operand_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_value!(Value, &str, String, bool, i64, i32, u32, f64, DateTime<Utc>, Vec<Value>);

impl From<Vec<&str>> for Operand {
    fn from(v: Vec<&str>) -> Self {
        Operand::Value(Value::Array(v.into_iter().map(Value::from).collect()))
    }
}

impl From<Vec<i64>> for Operand {
    fn from(v: Vec<i64>) -> Self {
        Operand::Value(Value::Array(v.into_iter().map(Value::from).collect()))
    }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Self {
        Operand::Expression(e)
    }
}

impl From<FieldRef> for Operand {
    fn from(f: FieldRef) -> Self {
        Operand::Expression(Expression::FieldRef(f))
    }
}

impl FromSource {
    /// Start a query over this source
    ///
    /// The builder owns its own copy of the joins, so later changes to this
    /// `FromSource` don't leak into it.
    pub fn new_query(&self) -> QueryBuilder {
        QueryBuilder::new(self.clone())
    }
}

/// Accumulates query clauses; terminal `select_*` calls yield a `Query`
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    from: FromSource,
    conditions: Vec<Condition>,
    group_by: Vec<Expression>,
    order_by: Vec<OrderExpression>,
    offset: usize,
    limit: usize,
    start_cursor: Option<String>,
}

impl QueryBuilder {
    /// Empty builder over `from`
    pub fn new(from: FromSource) -> Self {
        Self {
            from,
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: 0,
            start_cursor: None,
        }
    }

    /// Rows to skip
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Maximum rows; 0 means unlimited
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Append ORDER BY expressions
    pub fn order_by(mut self, order: impl IntoIterator<Item = OrderExpression>) -> Self {
        self.order_by.extend(order);
        self
    }

    /// Append GROUP BY expressions
    pub fn group_by(mut self, exprs: impl IntoIterator<Item = Expression>) -> Self {
        self.group_by.extend(exprs);
        self
    }

    /// Add conditions; all conditions of all calls are AND-combined
    pub fn where_conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Add `name <op> value`
    ///
    /// # Panics
    ///
    /// Panics when `value` is not acceptable for `op`; see
    /// [`Operand::into_expression`]. Use [`QueryBuilder::try_where_field`]
    /// for a fallible variant.
    pub fn where_field(self, name: &str, op: Operator, value: impl Into<Operand>) -> Self {
        match self.try_where_field(name, op, value) {
            Ok(builder) => builder,
            Err(e) => panic!("invalid where_field({:?}, {}): {}", name, op, e),
        }
    }

    /// Add `name <op> value`, reporting unacceptable values as errors
    pub fn try_where_field(
        mut self,
        name: &str,
        op: Operator,
        value: impl Into<Operand>,
    ) -> DalResult<Self> {
        let right = value.into().into_expression(op)?;
        let comparison = Comparison::new(Expression::field(name), op, right)?;
        self.conditions.push(comparison.into());
        Ok(self)
    }

    /// Add `name IN (values…)`
    pub fn where_in_array_field<I, V>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_field(name, Operator::In, Value::Array(values))
    }

    /// Resume from a continuation token
    pub fn start_from(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }

    fn condition(&self) -> Option<Condition> {
        match self.conditions.len() {
            0 => None,
            1 => Some(self.conditions[0].clone()),
            _ => Some(Condition::and(self.conditions.clone())),
        }
    }

    fn build(&self, into: Option<DataFactory>, id_kind: IdKind, columns: Vec<Column>) -> Query {
        Query {
            from: Some(self.from.clone()),
            condition: self.condition(),
            group_by: self.group_by.clone(),
            order_by: self.order_by.clone(),
            columns,
            into,
            id_kind,
            offset: self.offset,
            limit: self.limit,
            start_cursor: self.start_cursor.clone(),
        }
    }

    /// Query loading whole records, with payloads made by `factory`
    pub fn select_into<F>(&self, factory: F) -> Query
    where
        F: Fn() -> Box<dyn RecordData> + Send + Sync + 'static,
    {
        self.build(Some(Arc::new(factory)), IdKind::Unknown, Vec::new())
    }

    /// Query loading whole records into default-constructed `T`
    pub fn select_into_entity<T: Entity + Default>(&self) -> Query {
        self.select_into(|| Box::new(T::default()) as Box<dyn RecordData>)
    }

    /// Query yielding keys only
    pub fn select_keys_only(&self, id_kind: IdKind) -> Query {
        self.build(None, id_kind, Vec::new())
    }

    /// Query projecting the given columns into JSON object payloads
    pub fn select_columns(&self, columns: impl IntoIterator<Item = Column>) -> Query {
        self.build(None, IdKind::Unknown, columns.into_iter().collect())
    }
}
