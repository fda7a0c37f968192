//! Structured queries for the data access layer
//!
//! - `expression`: field references, constants, arrays, functions
//! - `condition`: comparisons and AND/OR groups
//! - `source`: collections, collection groups, joins
//! - `query`: the immutable `Query` and its text form
//! - `builder`: the fluent `QueryBuilder`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod condition;
pub mod expression;
pub mod query;
pub mod source;

pub use builder::{Operand, QueryBuilder};
pub use condition::{Comparison, Condition, GroupCondition, GroupOperator, Operator};
pub use expression::{avg, count, count_all, max, min, sum, Expression, FieldRef};
pub use query::{ascending, descending, Column, DataFactory, OrderExpression, Query};
pub use source::{
    from, CollectionGroupRef, CollectionRef, FromSource, JoinedSource, RecordsetSource,
};
