//! Query expressions
//!
//! A closed set: field references, constants, array literals and function
//! calls. Every expression has a text form used by `Query`'s `Display`.

use dal_core::{DalError, DalResult, Value};
use std::fmt;

/// Reference to a record field, or to the key id when `is_id` is set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    name: String,
    is_id: bool,
}

impl FieldRef {
    /// Reference a data field
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_id: false,
        }
    }

    /// Reference the key id under the given display name
    pub fn id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_id: true,
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when this refers to the key id rather than a data field
    pub fn is_id(&self) -> bool {
        self.is_id
    }
}

fn is_bare_word(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == "*" || is_bare_word(&self.name) {
            f.write_str(&self.name)
        } else {
            write!(f, "[{}]", self.name)
        }
    }
}

/// Node of a query expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Field or key id reference
    FieldRef(FieldRef),
    /// Literal scalar
    Constant(Value),
    /// Literal list of scalars of one type
    Array(Vec<Value>),
    /// Function call such as `SUM(price)`
    Function {
        /// Upper-case function name
        name: String,
        /// Arguments
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Reference a data field
    pub fn field(name: impl Into<String>) -> Self {
        Expression::FieldRef(FieldRef::new(name))
    }

    /// Reference the key id
    pub fn id(name: impl Into<String>) -> Self {
        Expression::FieldRef(FieldRef::id(name))
    }

    /// Literal constant
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    /// Literal array; elements must be scalars of a single type
    pub fn array<I, V>(values: I) -> DalResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        validate_array(&values)?;
        Ok(Expression::Array(values))
    }

    /// Function call
    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into().to_uppercase(),
            args,
        }
    }

    /// Field reference, if this is one
    pub fn as_field_ref(&self) -> Option<&FieldRef> {
        match self {
            Expression::FieldRef(f) => Some(f),
            _ => None,
        }
    }
}

pub(crate) fn validate_array(values: &[Value]) -> DalResult<()> {
    let mut element_type = None;
    for v in values {
        if !v.is_scalar() {
            return Err(DalError::invalid_argument(format!(
                "array literal element must be a scalar, got {}",
                v.type_name()
            )));
        }
        match element_type {
            None => element_type = Some(v.type_name()),
            Some(t) if t != v.type_name() => {
                return Err(DalError::invalid_argument(format!(
                    "array literal mixes {} and {}",
                    t,
                    v.type_name()
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

pub(crate) fn write_literal(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Int(i) => write!(f, "{}", i),
        Value::Float(x) => write!(f, "{}", x),
        other => write!(f, "{}", other.to_json()),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::FieldRef(field) => write!(f, "{}", field),
            Expression::Constant(v) => write_literal(f, v),
            Expression::Array(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_literal(f, v)?;
                }
                f.write_str(")")
            }
            Expression::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<FieldRef> for Expression {
    fn from(f: FieldRef) -> Self {
        Expression::FieldRef(f)
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::Constant(v)
    }
}

/// `SUM(expr)`
pub fn sum(expr: Expression) -> Expression {
    Expression::function("SUM", vec![expr])
}

/// `COUNT(expr)`
pub fn count(expr: Expression) -> Expression {
    Expression::function("COUNT", vec![expr])
}

/// `COUNT(*)`
pub fn count_all() -> Expression {
    count(Expression::field("*"))
}

/// `MIN(expr)`
pub fn min(expr: Expression) -> Expression {
    Expression::function("MIN", vec![expr])
}

/// `MAX(expr)`
pub fn max(expr: Expression) -> Expression {
    Expression::function("MAX", vec![expr])
}

/// `AVG(expr)`
pub fn avg(expr: Expression) -> Expression {
    Expression::function("AVG", vec![expr])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_ref_bare_word_vs_bracketed() {
        assert_eq!(FieldRef::new("email").to_string(), "email");
        assert_eq!(FieldRef::new("_id2").to_string(), "_id2");
        assert_eq!(FieldRef::new("first name").to_string(), "[first name]");
        assert_eq!(FieldRef::new("2nd").to_string(), "[2nd]");
        assert_eq!(FieldRef::new("a.b").to_string(), "[a.b]");
    }

    #[test]
    fn constants_render_as_literals() {
        assert_eq!(Expression::constant("it's").to_string(), "'it''s'");
        assert_eq!(Expression::constant(42).to_string(), "42");
        assert_eq!(Expression::constant(1.5).to_string(), "1.5");
        assert_eq!(Expression::constant(true).to_string(), "true");
        assert_eq!(Expression::Constant(Value::Null).to_string(), "null");
    }

    #[test]
    fn arrays_render_in_parentheses() {
        assert_eq!(
            Expression::array(["a", "b"]).unwrap().to_string(),
            "('a','b')"
        );
        assert_eq!(Expression::array([1, 2]).unwrap().to_string(), "(1,2)");
        assert_eq!(Expression::array(Vec::<Value>::new()).unwrap().to_string(), "()");
    }

    #[test]
    fn arrays_reject_mixed_or_nested_elements() {
        assert!(Expression::array(vec![Value::from(1), Value::from("a")]).is_err());
        assert!(Expression::array(vec![Value::Array(vec![])]).is_err());
        assert!(Expression::array(Vec::<Value>::new()).is_ok());
    }

    #[test]
    fn functions() {
        assert_eq!(sum(Expression::field("price")).to_string(), "SUM(price)");
        assert_eq!(count_all().to_string(), "COUNT(*)");
        assert_eq!(
            avg(Expression::field("unit price")).to_string(),
            "AVG([unit price])"
        );
        assert_eq!(
            Expression::function("coalesce", vec![Expression::field("a"), Expression::constant(0)])
                .to_string(),
            "COALESCE(a,0)"
        );
        assert_eq!(min(Expression::field("a")).to_string(), "MIN(a)");
        assert_eq!(max(Expression::field("a")).to_string(), "MAX(a)");
    }
}
