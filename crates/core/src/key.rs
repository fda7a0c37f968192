//! Hierarchical record keys
//!
//! A `Key` identifies a record by a chain of `(collection, id)` levels:
//!
//! ```text
//! Users/u1/Orders/42
//! └─┬─┘ └┬┘ └─┬──┘ └┬┘
//!  root id  child  id
//! ```
//!
//! The id of a level is a string, an integer, an ordered list of
//! `(field, value)` pairs (composite id) or a custom type. A key whose leaf id
//! is unset is *incomplete*; incomplete keys are used by keys-only queries and
//! by inserts that ask the adapter to generate an id.
//!
//! Keys are immutable by convention. Parents are shared behind `Arc` so that
//! cloning a deep key is cheap and parent identity can be compared by pointer.

use crate::error::{DalError, DalResult};
use crate::idgen;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// User-defined key id
///
/// Implement this for id types that are neither strings, integers nor
/// composite field lists. Two custom ids are equal when their `Display`
/// renderings are equal.
pub trait CustomKeyId: fmt::Debug + fmt::Display + Send + Sync {
    /// Check the id is well-formed; consulted by `Key::validate`
    fn validate(&self) -> DalResult<()> {
        Ok(())
    }
}

/// One component of a composite key id
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVal {
    /// Field name
    pub name: String,
    /// Field value
    pub value: Value,
}

impl FieldVal {
    /// Create a composite id component
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check the component has a name and a scalar value
    pub fn validate(&self) -> DalResult<()> {
        if self.name.trim().is_empty() {
            return Err(DalError::validation("composite key field has empty name"));
        }
        if !self.value.is_scalar() {
            return Err(DalError::validation(format!(
                "composite key field '{}' has non-scalar value of type {}",
                self.name,
                self.value.type_name()
            )));
        }
        Ok(())
    }
}

/// Coarse type tag of a key id, kept for incomplete keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdKind {
    /// Not known
    #[default]
    Unknown,
    /// String ids
    String,
    /// Integer ids
    Int,
    /// Composite field ids
    Fields,
    /// Custom ids
    Custom,
}

/// Identity of one key level
#[derive(Debug, Clone)]
pub enum KeyId {
    /// Unset (incomplete key)
    None,
    /// String id
    String(String),
    /// Integer id
    Int(i64),
    /// Composite id: ordered `(field, value)` pairs
    Fields(Vec<FieldVal>),
    /// User-defined id
    Custom(Arc<dyn CustomKeyId>),
}

impl KeyId {
    /// True when the id is unset
    pub fn is_none(&self) -> bool {
        matches!(self, KeyId::None)
    }

    /// Type tag of this id
    pub fn kind(&self) -> IdKind {
        match self {
            KeyId::None => IdKind::Unknown,
            KeyId::String(_) => IdKind::String,
            KeyId::Int(_) => IdKind::Int,
            KeyId::Fields(_) => IdKind::Fields,
            KeyId::Custom(_) => IdKind::Custom,
        }
    }

    /// Get as &str if this is a string id
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyId::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an integer id
    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyId::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl PartialEq for KeyId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyId::None, KeyId::None) => true,
            (KeyId::String(a), KeyId::String(b)) => a == b,
            (KeyId::Int(a), KeyId::Int(b)) => a == b,
            // Positional: same names and values in the same order
            (KeyId::Fields(a), KeyId::Fields(b)) => a == b,
            (KeyId::Custom(a), KeyId::Custom(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::None => Ok(()),
            KeyId::String(s) => f.write_str(s),
            KeyId::Int(i) => write!(f, "{}", i),
            KeyId::Fields(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("&")?;
                    }
                    write!(f, "{}={}", field.name, field.value)?;
                }
                Ok(())
            }
            KeyId::Custom(c) => write!(f, "{}", c),
        }
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId::String(s.to_string())
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        KeyId::String(s)
    }
}

impl From<i64> for KeyId {
    fn from(i: i64) -> Self {
        KeyId::Int(i)
    }
}

impl From<i32> for KeyId {
    fn from(i: i32) -> Self {
        KeyId::Int(i as i64)
    }
}

impl From<Vec<FieldVal>> for KeyId {
    fn from(fields: Vec<FieldVal>) -> Self {
        KeyId::Fields(fields)
    }
}

/// Option accepted by `Key::new`
pub enum KeyOption {
    /// Explicit id
    Id(KeyId),
    /// Composite id
    Fields(Vec<FieldVal>),
    /// Parent key
    Parent(Arc<Key>),
    /// Random string id of the given length after a prefix
    RandomStringId {
        /// Prefix placed before the random part
        prefix: String,
        /// Length of the random part
        length: usize,
    },
    /// Id produced by a thunk
    Generator(Box<dyn FnOnce() -> KeyId + Send>),
}

impl KeyOption {
    /// Explicit id
    pub fn id(id: impl Into<KeyId>) -> Self {
        KeyOption::Id(id.into())
    }

    /// Composite id
    pub fn fields(fields: Vec<FieldVal>) -> Self {
        KeyOption::Fields(fields)
    }

    /// Parent key
    pub fn parent(parent: Key) -> Self {
        KeyOption::Parent(Arc::new(parent))
    }

    /// Parent key shared with other children
    pub fn parent_arc(parent: Arc<Key>) -> Self {
        KeyOption::Parent(parent)
    }

    /// Random string id of the given length
    pub fn random_string_id(length: usize) -> Self {
        KeyOption::RandomStringId {
            prefix: String::new(),
            length,
        }
    }

    /// Random string id of the default length
    pub fn default_random_string_id() -> Self {
        Self::random_string_id(idgen::default_random_string_id_length())
    }

    /// Random string id of the given length after a prefix
    pub fn random_string_id_with_prefix(prefix: impl Into<String>, length: usize) -> Self {
        KeyOption::RandomStringId {
            prefix: prefix.into(),
            length,
        }
    }

    /// Id produced by a thunk
    pub fn generator<F>(f: F) -> Self
    where
        F: FnOnce() -> KeyId + Send + 'static,
    {
        KeyOption::Generator(Box::new(f))
    }
}

/// Hierarchical record identity
#[derive(Debug, Clone)]
pub struct Key {
    parent: Option<Arc<Key>>,
    collection: String,
    id: KeyId,
    id_kind: IdKind,
}

impl Key {
    /// Create a key from a collection and options
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the collection is empty or no option
    /// produced an id.
    pub fn try_new(
        collection: impl Into<String>,
        options: impl IntoIterator<Item = KeyOption>,
    ) -> DalResult<Key> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(DalError::invalid_argument("collection is a required parameter"));
        }
        let mut key = Key {
            parent: None,
            collection,
            id: KeyId::None,
            id_kind: IdKind::Unknown,
        };
        for option in options {
            match option {
                KeyOption::Id(id) => key.id = id,
                KeyOption::Fields(fields) => {
                    if fields.is_empty() {
                        return Err(DalError::invalid_argument(
                            "composite key requires at least one field",
                        ));
                    }
                    key.id = KeyId::Fields(fields);
                }
                KeyOption::Parent(parent) => key.parent = Some(parent),
                KeyOption::RandomStringId { prefix, length } => {
                    key.id = KeyId::String(idgen::random_string_with_prefix(&prefix, length));
                }
                KeyOption::Generator(f) => key.id = f(),
            }
        }
        if key.id.is_none() {
            return Err(DalError::invalid_argument(format!(
                "no id option supplied for key in collection '{}'",
                key.collection
            )));
        }
        key.id_kind = key.id.kind();
        Ok(key)
    }

    /// Create a key from a collection and options
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty or no option produced an id.
    /// Use [`Key::try_new`] to get an error instead.
    pub fn new(collection: impl Into<String>, options: impl IntoIterator<Item = KeyOption>) -> Key {
        match Self::try_new(collection, options) {
            Ok(key) => key,
            Err(e) => panic!("{}", e),
        }
    }

    /// Root key with an id
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty or the id is unset.
    pub fn with_id(collection: impl Into<String>, id: impl Into<KeyId>) -> Key {
        Self::new(collection, [KeyOption::id(id)])
    }

    /// Child key with an id
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty or the id is unset.
    pub fn with_parent_and_id(
        parent: &Key,
        collection: impl Into<String>,
        id: impl Into<KeyId>,
    ) -> Key {
        Self::new(
            collection,
            [KeyOption::parent(parent.clone()), KeyOption::id(id)],
        )
    }

    /// Root key with a composite id
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty or `fields` is empty.
    pub fn with_fields(collection: impl Into<String>, fields: Vec<FieldVal>) -> Key {
        Self::new(collection, [KeyOption::fields(fields)])
    }

    /// Key with no id yet, or an error when the collection is empty
    pub fn try_incomplete(collection: impl Into<String>, id_kind: IdKind) -> DalResult<Key> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(DalError::invalid_argument("collection is a required parameter"));
        }
        Ok(Key {
            parent: None,
            collection,
            id: KeyId::None,
            id_kind,
        })
    }

    /// Child key with no id yet, or an error when the collection is empty
    pub fn try_incomplete_with_parent(
        parent: &Key,
        collection: impl Into<String>,
        id_kind: IdKind,
    ) -> DalResult<Key> {
        let mut key = Self::try_incomplete(collection, id_kind)?;
        key.parent = Some(Arc::new(parent.clone()));
        Ok(key)
    }

    /// Key with no id yet
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty. Use [`Key::try_incomplete`] to
    /// get an error instead.
    pub fn incomplete(collection: impl Into<String>, id_kind: IdKind) -> Key {
        match Self::try_incomplete(collection, id_kind) {
            Ok(key) => key,
            Err(e) => panic!("{}", e),
        }
    }

    /// Child key with no id yet
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty.
    pub fn incomplete_with_parent(
        parent: &Key,
        collection: impl Into<String>,
        id_kind: IdKind,
    ) -> Key {
        match Self::try_incomplete_with_parent(parent, collection, id_kind) {
            Ok(key) => key,
            Err(e) => panic!("{}", e),
        }
    }

    /// Collection name of this level
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Id of this level
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Type tag of the id (kept for incomplete keys)
    pub fn id_kind(&self) -> IdKind {
        self.id_kind
    }

    /// Parent key, if any
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Shared parent handle, if any
    pub fn parent_arc(&self) -> Option<&Arc<Key>> {
        self.parent.as_ref()
    }

    /// Set the id of this level
    pub fn set_id(&mut self, id: impl Into<KeyId>) {
        self.id = id.into();
        if !self.id.is_none() {
            self.id_kind = self.id.kind();
        }
    }

    /// Unset the id of this level, keeping its kind
    pub fn clear_id(&mut self) {
        self.id = KeyId::None;
    }

    /// True when this level has an id
    pub fn is_complete(&self) -> bool {
        !self.id.is_none()
    }

    /// Depth in the hierarchy: 0 at the root
    pub fn level(&self) -> usize {
        let mut level = 0;
        let mut current = self.parent.as_deref();
        while let Some(key) = current {
            level += 1;
            current = key.parent.as_deref();
        }
        level
    }

    /// Levels from the root down to this key
    fn levels(&self) -> Vec<&Key> {
        let mut levels = Vec::with_capacity(self.level() + 1);
        let mut current = Some(self);
        while let Some(key) = current {
            levels.push(key);
            current = key.parent.as_deref();
        }
        levels.reverse();
        levels
    }

    /// `collection/id/.../collection/id`, root first
    ///
    /// An incomplete level contributes only its collection.
    pub fn path(&self) -> String {
        self.levels()
            .iter()
            .map(|k| {
                if k.id.is_none() {
                    k.collection.clone()
                } else {
                    format!("{}/{}", k.collection, k.id)
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// `collection/.../collection`, root first, without ids
    pub fn collection_path(&self) -> String {
        self.levels()
            .iter()
            .map(|k| k.collection.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Check every level is well-formed
    pub fn validate(&self) -> DalResult<()> {
        for (level, key) in self.levels().into_iter().enumerate() {
            if key.collection.trim().is_empty() {
                return Err(DalError::validation(format!(
                    "key at level {} has empty collection",
                    level
                )));
            }
            match &key.id {
                KeyId::Fields(fields) => {
                    if fields.is_empty() {
                        return Err(DalError::validation(format!(
                            "composite key at level {} has no fields",
                            level
                        )));
                    }
                    for field in fields {
                        field.validate()?;
                    }
                }
                KeyId::Custom(custom) => custom.validate()?,
                KeyId::None | KeyId::String(_) | KeyId::Int(_) => {}
            }
        }
        Ok(())
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection && self.id == other.id && self.parent == other.parent
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// True iff collections and ids match at every level
pub fn equal_keys(a: &Key, b: &Key) -> bool {
    a == b
}
