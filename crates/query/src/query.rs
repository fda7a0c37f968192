//! Immutable structured query and its text form
//!
//! The text form is for debugging and, in SQL-flavored backends, doubles as
//! the wire query:
//!
//! ```text
//! SELECT [TOP n] (*|col|col1,col2,…)
//! FROM [path]
//! WHERE <condition>
//! GROUP BY e1, e2
//! ORDER BY e1, e2 DESC
//! OFFSET k
//! ```
//!
//! A query with at most one column and a bare comparison (or no condition)
//! keeps SELECT/FROM/WHERE on one line; otherwise columns are indented on
//! their own lines. GROUP BY, ORDER BY and OFFSET always start a new line.

use crate::condition::Condition;
use crate::expression::Expression;
use crate::source::FromSource;
use dal_core::{IdKind, RecordData};
use std::fmt;
use std::sync::Arc;

/// Makes an empty payload for each record a reader yields
pub type DataFactory = Arc<dyn Fn() -> Box<dyn RecordData> + Send + Sync>;

/// Expression with a sort direction
#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpression {
    expression: Expression,
    descending: bool,
}

impl OrderExpression {
    /// Ascending order
    pub fn ascending(expression: impl Into<Expression>) -> Self {
        Self {
            expression: expression.into(),
            descending: false,
        }
    }

    /// Descending order
    pub fn descending(expression: impl Into<Expression>) -> Self {
        Self {
            expression: expression.into(),
            descending: true,
        }
    }

    /// Ordered expression
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// True for descending order
    pub fn is_descending(&self) -> bool {
        self.descending
    }
}

impl fmt::Display for OrderExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if self.descending {
            f.write_str(" DESC")?;
        }
        Ok(())
    }
}

/// Ascending order on a field
pub fn ascending(field: &str) -> OrderExpression {
    OrderExpression::ascending(Expression::field(field))
}

/// Descending order on a field
pub fn descending(field: &str) -> OrderExpression {
    OrderExpression::descending(Expression::field(field))
}

/// Selected expression with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    expression: Expression,
    alias: Option<String>,
}

impl Column {
    /// Select an expression
    pub fn new(expression: impl Into<Expression>) -> Self {
        Self {
            expression: expression.into(),
            alias: None,
        }
    }

    /// Select a field
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(Expression::field(name))
    }

    /// Attach an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Selected expression
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Alias, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name the column's value is reported under
    pub fn output_name(&self) -> String {
        match (&self.alias, &self.expression) {
            (Some(alias), _) => alias.clone(),
            (None, Expression::FieldRef(f)) => f.name().to_string(),
            (None, e) => e.to_string(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// Immutable structured query, produced by `QueryBuilder`
#[derive(Clone)]
pub struct Query {
    pub(crate) from: Option<FromSource>,
    pub(crate) condition: Option<Condition>,
    pub(crate) group_by: Vec<Expression>,
    pub(crate) order_by: Vec<OrderExpression>,
    pub(crate) columns: Vec<Column>,
    pub(crate) into: Option<DataFactory>,
    pub(crate) id_kind: IdKind,
    pub(crate) offset: usize,
    pub(crate) limit: usize,
    pub(crate) start_cursor: Option<String>,
}

impl Query {
    /// Query evaluating `columns` without reading any source, e.g. `SELECT 1`
    pub fn select(columns: impl IntoIterator<Item = Column>) -> Query {
        Query {
            from: None,
            condition: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            columns: columns.into_iter().collect(),
            into: None,
            id_kind: IdKind::Unknown,
            offset: 0,
            limit: 0,
            start_cursor: None,
        }
    }

    /// FROM clause; `None` for source-less queries
    pub fn from_source(&self) -> Option<&FromSource> {
        self.from.as_ref()
    }

    /// WHERE clause
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// GROUP BY expressions
    pub fn group_by(&self) -> &[Expression] {
        &self.group_by
    }

    /// ORDER BY expressions
    pub fn order_by(&self) -> &[OrderExpression] {
        &self.order_by
    }

    /// Selected columns; empty means whole records
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Payload factory for loaded records; `None` for keys-only queries
    pub fn data_factory(&self) -> Option<&DataFactory> {
        self.into.as_ref()
    }

    /// Id kind of the keys produced
    pub fn id_kind(&self) -> IdKind {
        self.id_kind
    }

    /// Rows to skip
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Maximum rows; 0 means unlimited
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Continuation token to resume from
    pub fn start_cursor(&self) -> Option<&str> {
        self.start_cursor.as_deref()
    }

    /// True when the query yields keys without payloads
    pub fn is_keys_only(&self) -> bool {
        self.into.is_none() && self.columns.is_empty()
    }

    /// Name of the primary source collection
    pub fn collection(&self) -> Option<&str> {
        self.from.as_ref().map(|f| f.source().name())
    }

    /// Same query, yielding keys only
    pub fn key_query(&self) -> Query {
        Query {
            into: None,
            columns: Vec::new(),
            ..self.clone()
        }
    }

    /// Same query with a different page size
    pub fn with_limit(&self, limit: usize) -> Query {
        Query {
            limit,
            ..self.clone()
        }
    }

    /// Same query resuming at `cursor`
    pub fn with_start_cursor(&self, cursor: impl Into<String>) -> Query {
        Query {
            start_cursor: Some(cursor.into()),
            ..self.clone()
        }
    }

    fn single_line(&self) -> bool {
        self.columns.len() <= 1 && self.condition.as_ref().map_or(true, Condition::is_comparison)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("text", &self.to_string())
            .field("keys_only", &self.is_keys_only())
            .field("id_kind", &self.id_kind)
            .field("start_cursor", &self.start_cursor)
            .finish()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let single = self.single_line();
        let sep = if single { " " } else { "\n" };

        f.write_str("SELECT")?;
        if self.limit > 0 {
            write!(f, " TOP {}", self.limit)?;
        }
        match self.columns.len() {
            0 => f.write_str(" *")?,
            1 if single => write!(f, " {}", self.columns[0])?,
            _ => {
                for (i, c) in self.columns.iter().enumerate() {
                    f.write_str(if i == 0 { "\n\t" } else { ",\n\t" })?;
                    write!(f, "{}", c)?;
                }
            }
        }

        if let Some(from) = &self.from {
            write!(f, "{}FROM {}", sep, from.source())?;
            for join in from.joins() {
                write!(f, "{}{}", sep, join)?;
            }
        }
        if let Some(condition) = &self.condition {
            write!(f, "{}WHERE {}", sep, condition)?;
        }
        if !self.group_by.is_empty() {
            f.write_str("\nGROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if !self.order_by.is_empty() {
            f.write_str("\nORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if self.offset > 0 {
            write!(f, "\nOFFSET {}", self.offset)?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
