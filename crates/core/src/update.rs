//! Field-level update descriptors
//!
//! An [`Update`] targets one field, either by top-level name or by path into
//! nested objects, and carries an [`UpdateValue`]. Backend-interpreted
//! sentinels (`DeleteField`, `ServerTimestamp`, transforms) are variants of
//! `UpdateValue` rather than of `Value`, so they can only ever be the direct
//! value of a field.

use crate::error::{DalError, DalResult};
use crate::transform::Transform;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Path into nested objects; each component is one field name
pub type FieldPath = Vec<String>;

/// Value assigned by an update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    /// Plain value written as-is
    Value(Value),
    /// Remove the field
    DeleteField,
    /// Backend commit time
    ServerTimestamp,
    /// Backend-side operation on the current value
    Transform(Transform),
}

impl UpdateValue {
    /// True for `DeleteField`, `ServerTimestamp` and transforms
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, UpdateValue::Value(_))
    }

    /// The plain value, if this is not a sentinel
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            UpdateValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateValue::Value(v) => write!(f, "{}", v),
            UpdateValue::DeleteField => f.write_str("DeleteField"),
            UpdateValue::ServerTimestamp => f.write_str("ServerTimestamp"),
            UpdateValue::Transform(t) => write!(f, "{}", t),
        }
    }
}

impl From<Value> for UpdateValue {
    fn from(v: Value) -> Self {
        UpdateValue::Value(v)
    }
}

impl From<Transform> for UpdateValue {
    fn from(t: Transform) -> Self {
        UpdateValue::Transform(t)
    }
}

macro_rules! update_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for UpdateValue {
                fn from(v: $t) -> Self {
                    UpdateValue::Value(Value::from(v))
                }
            }
        )*
    };
}

update_value_from!(
    &str,
    String,
    bool,
    i64,
    i32,
    u32,
    f64,
    Vec<u8>,
    Vec<Value>,
    BTreeMap<String, Value>,
    DateTime<Utc>
);

/// Remove the field
pub const DELETE_FIELD: UpdateValue = UpdateValue::DeleteField;

/// Backend commit time
pub const SERVER_TIMESTAMP: UpdateValue = UpdateValue::ServerTimestamp;

/// One field assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    field_name: Option<String>,
    field_path: Option<FieldPath>,
    value: UpdateValue,
}

impl Update {
    /// Update a top-level field
    ///
    /// A dotted name such as `"address.city"` is rewritten to the
    /// equivalent field path.
    pub fn by_field_name(name: impl Into<String>, value: impl Into<UpdateValue>) -> Self {
        let name = name.into();
        if name.contains('.') {
            return Self::by_field_path(name.split('.').map(str::to_string), value);
        }
        Self {
            field_name: Some(name),
            field_path: None,
            value: value.into(),
        }
    }

    /// Update a nested field
    pub fn by_field_path<I, S>(path: I, value: impl Into<UpdateValue>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_name: None,
            field_path: Some(path.into_iter().map(Into::into).collect()),
            value: value.into(),
        }
    }

    /// Top-level field name, when addressed by name
    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    /// Field path, when addressed by path
    pub fn field_path(&self) -> Option<&[String]> {
        self.field_path.as_deref()
    }

    /// Path components regardless of how the field was addressed
    pub fn path(&self) -> Vec<&str> {
        match (&self.field_name, &self.field_path) {
            (Some(name), _) => vec![name.as_str()],
            (None, Some(path)) => path.iter().map(String::as_str).collect(),
            (None, None) => Vec::new(),
        }
    }

    /// Assigned value
    pub fn value(&self) -> &UpdateValue {
        &self.value
    }

    /// Check the descriptor is well formed
    ///
    /// Exactly one of name and path is set, a name has no dots, a path is
    /// non-empty and none of its components is blank. Transform arguments
    /// are checked too.
    pub fn validate(&self) -> DalResult<()> {
        match (&self.field_name, &self.field_path) {
            (Some(_), Some(_)) => {
                return Err(DalError::validation(
                    "update has both field name and field path",
                ))
            }
            (None, None) => {
                return Err(DalError::validation(
                    "update has neither field name nor field path",
                ))
            }
            (Some(name), None) => {
                if name.trim().is_empty() {
                    return Err(DalError::validation("update field name is empty"));
                }
                if name.contains('.') {
                    return Err(DalError::validation(format!(
                        "update field name {:?} contains '.', use a field path",
                        name
                    )));
                }
            }
            (None, Some(path)) => {
                if path.is_empty() {
                    return Err(DalError::validation("update field path is empty"));
                }
                if let Some(i) = path.iter().position(|p| p.trim().is_empty()) {
                    return Err(DalError::validation(format!(
                        "update field path has blank component at index {}",
                        i
                    )));
                }
            }
        }
        if let UpdateValue::Transform(t) = &self.value {
            t.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.path().join("."), self.value)
    }
}
