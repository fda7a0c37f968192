//! Record: a key bound to user data plus retrieval state
//!
//! ## Retrieval state
//!
//! | state                       | `exists()` | `error()` | `data()` |
//! |-----------------------------|------------|-----------|----------|
//! | never attached to an op     | panics     | `None`    | panics   |
//! | `set_error(None)`           | `true`     | `None`    | payload  |
//! | `set_error(Some(not found))`| `false`    | `None`    | payload  |
//! | `set_error(Some(other))`    | panics     | `Some`    | payload  |
//!
//! A record is not safe for concurrent mutation; share it behind a lock
//! (see `changes::RecordHandle`) when needed.

use crate::entity::{Entity, JsonMap, RecordData};
use crate::error::DalError;
use crate::key::{IdKind, Key};
use std::fmt;

/// Key, data and the outcome of the last operation on them
pub struct Record {
    key: Key,
    data: Box<dyn RecordData>,
    // None: never attached to an operation result. Some(Ok): done, exists.
    status: Option<Result<(), DalError>>,
    changed: bool,
}

impl Record {
    /// Record with an empty JSON object as data
    pub fn new(key: Key) -> Self {
        Self::with_data(key, JsonMap::new())
    }

    /// Record with typed data
    pub fn with_data<T: Entity>(key: Key, data: T) -> Self {
        Self::with_boxed_data(key, Box::new(data))
    }

    /// Record with already type-erased data
    pub fn with_boxed_data(key: Key, data: Box<dyn RecordData>) -> Self {
        Self {
            key,
            data,
            status: None,
            changed: false,
        }
    }

    /// Record whose key id is to be generated on insert
    ///
    /// # Panics
    ///
    /// Panics when the collection is empty.
    pub fn with_incomplete_key<T: Entity>(
        collection: impl Into<String>,
        id_kind: IdKind,
        data: T,
    ) -> Self {
        Self::with_data(Key::incomplete(collection, id_kind), data)
    }

    /// Record key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Mutable record key (adapters assign generated ids through this)
    pub fn key_mut(&mut self) -> &mut Key {
        &mut self.key
    }

    /// User payload
    ///
    /// # Panics
    ///
    /// Panics if the record was never attached to an operation result,
    /// i.e. `set_error` was never called.
    pub fn data(&self) -> &dyn RecordData {
        if self.status.is_none() {
            panic!(
                "record {} data requested before it was attached to an operation result",
                self.key
            );
        }
        self.data.as_ref()
    }

    /// Typed view of the payload; `None` when the payload is another type
    ///
    /// # Panics
    ///
    /// Same as [`Record::data`].
    pub fn data_as<T: Entity>(&self) -> Option<&T> {
        self.data().as_any().downcast_ref::<T>()
    }

    /// Mutable payload for adapters writing loaded data through
    pub fn data_mut(&mut self) -> &mut dyn RecordData {
        self.data.as_mut()
    }

    /// Mutable typed view of the payload
    pub fn data_as_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.data.as_any_mut().downcast_mut::<T>()
    }

    /// Replace the payload
    pub fn set_data<T: Entity>(&mut self, data: T) {
        self.data = Box::new(data);
    }

    /// Key and payload borrowed together, for hooks that need both
    pub fn key_and_data_mut(&mut self) -> (&Key, &mut dyn RecordData) {
        (&self.key, self.data.as_mut())
    }

    /// True once an operation result has been attached
    pub fn is_loaded(&self) -> bool {
        self.status.is_some()
    }

    /// Whether the record exists in the store
    ///
    /// # Panics
    ///
    /// Panics if no operation result is attached, or the attached error is
    /// something other than not-found.
    pub fn exists(&self) -> bool {
        match &self.status {
            Some(Ok(())) => true,
            Some(Err(e)) if e.is_not_found() => false,
            Some(Err(e)) => panic!("record {} has an error: {}", self.key, e),
            None => panic!(
                "record {} existence requested before it was attached to an operation result",
                self.key
            ),
        }
    }

    /// Error of the last operation; not-found and success both read as `None`
    pub fn error(&self) -> Option<&DalError> {
        match &self.status {
            Some(Err(e)) if !e.is_not_found() => Some(e),
            _ => None,
        }
    }

    /// Attach the outcome of an operation; `None` means success
    pub fn set_error(&mut self, err: Option<DalError>) -> &mut Self {
        self.status = Some(match err {
            None => Ok(()),
            Some(e) => Err(e),
        });
        self
    }

    /// Dirty flag
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Set the dirty flag
    pub fn mark_as_changed(&mut self) {
        self.changed = true;
    }

    /// Clear the dirty flag (after the change was persisted)
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.key.path())
            .field("data", &self.data)
            .field("status", &self.status)
            .field("changed", &self.changed)
            .finish()
    }
}
