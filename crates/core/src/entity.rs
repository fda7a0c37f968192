//! User data carried by records
//!
//! Application types opt in by implementing [`Entity`]; every hook has a
//! no-op default, so a plain `impl Entity for User {}` is enough:
//!
//! ```
//! use dal_core::{Entity, DalError, DalResult};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct User {
//!     email: String,
//! }
//!
//! impl Entity for User {
//!     fn validate(&self) -> DalResult<()> {
//!         if self.email.contains('@') {
//!             Ok(())
//!         } else {
//!             Err(DalError::validation("email is invalid"))
//!         }
//!     }
//! }
//! ```
//!
//! Adapters never see the concrete type: a record stores its payload as a
//! `Box<dyn RecordData>`, which moves data in and out as JSON and exposes the
//! hooks. Only owned, serde-capable types qualify, so a scalar that an adapter
//! could not write through is rejected at compile time.

use crate::context::Context;
use crate::error::{DalError, DalResult};
use crate::key::Key;
use crate::record::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// JSON object payload, the default data of `Record::new`
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Application data that can live in a record
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + fmt::Debug + 'static {
    /// Self-validation, run automatically before save
    fn validate(&self) -> DalResult<()> {
        Ok(())
    }

    /// Validation that needs the record key, run automatically before save
    fn validate_with_key(&self, _key: &Key) -> DalResult<()> {
        Ok(())
    }

    /// Called by adapters right before the data is written
    fn before_save(&mut self, _ctx: &Context, _key: &Key) -> DalResult<()> {
        Ok(())
    }

    /// Called by adapters right after the data is loaded
    fn after_load(&mut self, _ctx: &Context, _key: &Key) -> DalResult<()> {
        Ok(())
    }
}

impl Entity for JsonMap {}
impl Entity for serde_json::Value {}
impl Entity for BTreeMap<String, serde_json::Value> {}
impl Entity for HashMap<String, serde_json::Value> {}

/// Type-erased record payload, as seen by adapters
pub trait RecordData: Send + Sync + fmt::Debug {
    /// Serialize the payload
    fn to_json(&self) -> DalResult<serde_json::Value>;

    /// Overwrite the payload in place from a stored value
    fn load_json(&mut self, value: serde_json::Value) -> DalResult<()>;

    /// Run `Entity::validate` and `Entity::validate_with_key`
    fn validate_data(&self, key: &Key) -> DalResult<()>;

    /// Run `Entity::before_save`
    fn run_before_save(&mut self, ctx: &Context, key: &Key) -> DalResult<()>;

    /// Run `Entity::after_load`
    fn run_after_load(&mut self, ctx: &Context, key: &Key) -> DalResult<()>;

    /// Name of the concrete type, for diagnostics
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> RecordData for T {
    fn to_json(&self) -> DalResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn load_json(&mut self, value: serde_json::Value) -> DalResult<()> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }

    fn validate_data(&self, key: &Key) -> DalResult<()> {
        Entity::validate(self)?;
        Entity::validate_with_key(self, key)
    }

    fn run_before_save(&mut self, ctx: &Context, key: &Key) -> DalResult<()> {
        Entity::before_save(self, ctx, key)
    }

    fn run_after_load(&mut self, ctx: &Context, key: &Key) -> DalResult<()> {
        Entity::after_load(self, ctx, key)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Run the save-side hooks of a record: `before_save`, then validation
///
/// A failing `before_save` is reported as `HookFailed`; validation errors
/// are wrapped with the record key.
pub fn before_save(ctx: &Context, record: &mut Record) -> DalResult<()> {
    let (key, data) = record.key_and_data_mut();
    data.run_before_save(ctx, key)
        .map_err(|e| DalError::hook_failed("BeforeSave", e))?;
    data.validate_data(key)
        .map_err(|e| e.context(format!("record {} failed validation", key)))
}

/// Run the load-side hook of a record
///
/// A failing `after_load` is reported as `HookFailed`.
pub fn after_load(ctx: &Context, record: &mut Record) -> DalResult<()> {
    let (key, data) = record.key_and_data_mut();
    data.run_after_load(ctx, key)
        .map_err(|e| DalError::hook_failed("AfterLoad", e))
}
