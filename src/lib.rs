//! DAL - database-agnostic data access layer
//!
//! Applications describe what they read and write in backend-neutral terms
//! (keys, records, structured queries, field updates) and run that work
//! inside transactions that an adapter executes against a concrete store.
//!
//! # Quick Start
//!
//! ```
//! use dal::prelude::*;
//! use dal::storage::MemoryDatabase;
//!
//! let ctx = Context::background();
//! let db = MemoryDatabase::new("app");
//!
//! let mut data = JsonMap::new();
//! data.insert("name".into(), serde_json::json!("Ann"));
//! db.run_readwrite_transaction(
//!     &ctx,
//!     &mut |ctx, tx| tx.set(ctx, &mut Record::with_data(Key::with_id("Users", "u1"), data.clone())),
//!     &[],
//! )?;
//!
//! let mut record = Record::new(Key::with_id("Users", "u1"));
//! db.get(&ctx, &mut record)?;
//! assert!(record.exists());
//! # Ok::<(), DalError>(())
//! ```
//!
//! # Crates
//!
//! - [`core`]: keys, records, values, context, errors, updates, config
//! - [`query`]: query AST, text form and builder
//! - [`recordset`]: columnar recordsets and their readers
//! - [`api`]: sessions, transactions, readers, inserts with generated ids
//! - [`storage`]: the in-memory adapter

pub use dal_api as api;
pub use dal_core as core;
pub use dal_query as query;
pub use dal_recordset as recordset;
pub use dal_storage as storage;

/// Types most applications need
pub mod prelude {
    pub use dal_api::{
        select_all, select_all_ids, with_limit, with_offset, Database, InsertOptions, ReadSession,
        ReadTransaction, Reader, ReadwriteTransaction, Transaction, TransactionCoordinator,
        TxOption, WriteSession,
    };
    pub use dal_core::{
        Context, DalError, DalResult, Entity, IdKind, JsonMap, Key, KeyId, Precondition, Record,
        Update, Value,
    };
    pub use dal_query::{ascending, descending, from, Column, Operator, Query};
}
