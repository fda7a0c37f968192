//! In-memory storage adapter for the data access layer
//!
//! `MemoryDatabase` keeps records as JSON in an ordered map and runs
//! optimistic transactions against it:
//! - reads record the version they saw (read set)
//! - writes are buffered per transaction
//! - commit validates the read set and applies the writes atomically
//!
//! Queries are evaluated in process: filtering, ordering, paging, start
//! cursors, column projection and aggregates. Joins and `GROUP BY` are not
//! supported.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod eval;
pub mod mutation;
pub mod reader;
pub mod store;
pub mod transaction;
pub mod validation;

pub use database::{MemoryDatabase, ADAPTER_NAME};
pub use reader::{MemoryReader, MemoryRecordsetReader};
pub use store::{MemoryStore, PendingWrite, StoredRecord};
pub use transaction::MemoryTransaction;
pub use validation::{validate_read_set, ReadSet, ReadWriteConflict, ValidationResult};
