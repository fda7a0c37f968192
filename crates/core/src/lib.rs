//! Core types of the data access layer
//!
//! This crate defines the backend-agnostic vocabulary shared by every other
//! DAL crate:
//! - Key: hierarchical record address (parent chain, collection, id)
//! - Record: key + user data + retrieval state
//! - Entity: opt-in trait for user data, with save/load hooks
//! - Value: dynamic value used at untyped boundaries
//! - Context: cancellation, deadline and request-scoped values
//! - Changes: accumulator of records modified in a unit of work
//! - Update / Precondition / Transform: field-level mutation descriptors
//! - DalError: error type with classification helpers
//! - DalConfig: `dal.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod idgen;
pub mod key;
pub mod precondition;
pub mod record;
pub mod transform;
pub mod update;
pub mod value;

pub use changes::{record_handle, Changes, RecordHandle};
pub use config::DalConfig;
pub use context::{CancelHandle, Context};
pub use entity::{Entity, JsonMap, RecordData};
pub use error::{is_not_found, DalError, DalResult};
pub use idgen::TimeAccuracy;
pub use key::{equal_keys, CustomKeyId, FieldVal, IdKind, Key, KeyId, KeyOption};
pub use precondition::{
    get_preconditions, with_exists_precondition, with_last_update_time_precondition,
    Precondition, Preconditions,
};
pub use record::Record;
pub use transform::Transform;
pub use update::{FieldPath, Update, UpdateValue, DELETE_FIELD, SERVER_TIMESTAMP};
pub use value::Value;
