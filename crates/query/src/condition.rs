//! Query conditions: binary comparisons and AND/OR groups

use crate::expression::Expression;
use dal_core::{DalError, DalResult};
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessOrEqual,
    /// `IN`, right side is an array
    In,
}

impl Operator {
    /// Operator symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::In => "IN",
        }
    }

    /// True for operators whose right side is a set of values
    pub fn is_group(&self) -> bool {
        matches!(self, Operator::In)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `left <op> right`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    operator: Operator,
    left: Expression,
    right: Expression,
}

impl Comparison {
    /// Build a comparison
    ///
    /// `IN` requires an array on the right; no other operator accepts one.
    pub fn new(left: Expression, operator: Operator, right: Expression) -> DalResult<Self> {
        let right_is_array = matches!(right, Expression::Array(_));
        if operator.is_group() && !right_is_array {
            return Err(DalError::invalid_argument(format!(
                "operator {} expects an array on the right, got {}",
                operator, right
            )));
        }
        if !operator.is_group() && right_is_array {
            return Err(DalError::invalid_argument(format!(
                "operator {} does not accept an array on the right",
                operator
            )));
        }
        Ok(Self {
            operator,
            left,
            right,
        })
    }

    /// Operator
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Left operand
    pub fn left(&self) -> &Expression {
        &self.left
    }

    /// Right operand
    pub fn right(&self) -> &Expression {
        &self.right
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

/// Logical operator of a condition group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupOperator {
    /// All conditions hold
    And,
    /// At least one condition holds
    Or,
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupOperator::And => "AND",
            GroupOperator::Or => "OR",
        })
    }
}

/// Conditions joined by one logical operator
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCondition {
    operator: GroupOperator,
    conditions: Vec<Condition>,
}

impl GroupCondition {
    /// Build a group
    pub fn new(operator: GroupOperator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    /// Logical operator
    pub fn operator(&self) -> GroupOperator {
        self.operator
    }

    /// Member conditions
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl fmt::Display for GroupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.operator)?;
            }
            write!(f, "{}", c)?;
        }
        f.write_str(")")
    }
}

/// WHERE clause node
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Single comparison
    Comparison(Comparison),
    /// AND/OR group
    Group(GroupCondition),
}

impl Condition {
    /// All of `conditions`
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::Group(GroupCondition::new(GroupOperator::And, conditions))
    }

    /// Any of `conditions`
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Group(GroupCondition::new(GroupOperator::Or, conditions))
    }

    /// True for a bare comparison
    pub fn is_comparison(&self) -> bool {
        matches!(self, Condition::Comparison(_))
    }
}

impl From<Comparison> for Condition {
    fn from(c: Comparison) -> Self {
        Condition::Comparison(c)
    }
}

impl From<GroupCondition> for Condition {
    fn from(g: GroupCondition) -> Self {
        Condition::Group(g)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison(c) => write!(f, "{}", c),
            Condition::Group(g) => write!(f, "{}", g),
        }
    }
}
