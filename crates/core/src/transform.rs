//! Server-side transforms
//!
//! A transform is an operation the backend applies to a field's current value
//! at write time (increment a counter, add elements to an array). The core
//! treats it as opaque: a name plus an argument. Adapters match on the name.

use crate::error::{DalError, DalResult};
use crate::value::Value;
use std::fmt;

/// Name of the increment transform
pub const INCREMENT: &str = "increment";

/// Name of the array-union transform
pub const ARRAY_UNION: &str = "arrayUnion";

/// Opaque server-side operation
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    name: String,
    value: Value,
}

impl Transform {
    /// Custom transform; adapters that don't know `name` should refuse it
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Transform name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform argument
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Check built-in transforms carry the argument type they need
    pub fn validate(&self) -> DalResult<()> {
        if self.name.trim().is_empty() {
            return Err(DalError::validation("transform name is empty"));
        }
        match self.name.as_str() {
            INCREMENT if !self.value.is_number() => Err(DalError::validation(format!(
                "increment expects a number, got {}",
                self.value.type_name()
            ))),
            ARRAY_UNION if self.value.as_array().is_none() => Err(DalError::validation(format!(
                "arrayUnion expects an array, got {}",
                self.value.type_name()
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.value)
    }
}

/// Add `n` to the field's current numeric value (missing counts as zero)
pub fn increment(n: impl Into<Value>) -> Transform {
    Transform::new(INCREMENT, n)
}

/// Append each element not already present in the field's array
pub fn array_union<I, V>(elems: I) -> Transform
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Transform::new(
        ARRAY_UNION,
        Value::Array(elems.into_iter().map(Into::into).collect()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_carries_name_and_value() {
        let t = increment(5);
        assert_eq!(t.name(), INCREMENT);
        assert_eq!(t.value(), &Value::Int(5));
        assert!(t.validate().is_ok());
        assert_eq!(t.to_string(), "increment(5)");
    }

    #[test]
    fn array_union_wraps_elements() {
        let t = array_union(["a", "b"]);
        assert_eq!(t.name(), ARRAY_UNION);
        assert_eq!(
            t.value(),
            &Value::Array(vec![Value::from("a"), Value::from("b")])
        );
        assert!(t.validate().is_ok());
    }

    #[test]
    fn increment_requires_number() {
        assert!(increment("x").validate().is_err());
    }

    #[test]
    fn custom_transform_is_opaque() {
        let t = Transform::new("maximum", 10);
        assert!(t.validate().is_ok());
        assert!(Transform::new(" ", 1).validate().is_err());
    }
}
