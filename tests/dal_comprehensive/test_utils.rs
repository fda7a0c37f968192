//! Test utilities for the DAL comprehensive tests
//!
//! Provides a sample entity, seeded databases and small assertion helpers.

pub use dal::api::{
    get_transaction, select_all, select_all_ids, with_limit, with_offset, Database,
    InsertOptions, ReadSession, ReadTransaction, Reader, ReadwriteTransaction, Transaction,
    TransactionCoordinator, TxOption, WriteSession,
};
pub use dal::core::{
    with_exists_precondition, with_last_update_time_precondition, Context, DalError, DalResult,
    Entity, IdKind, JsonMap, Key, KeyId, Record, Update, Value,
};
pub use dal::query::{ascending, descending, from, Column, Operator, Query};
pub use dal::storage::MemoryDatabase;
use serde::{Deserialize, Serialize};

// =============================================================================
// Entities
// =============================================================================

/// Sample entity with validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub city: String,
    pub age: i64,
}

impl Entity for User {
    fn validate(&self) -> DalResult<()> {
        if self.name.is_empty() {
            return Err(DalError::validation("user name is required"));
        }
        Ok(())
    }
}

pub fn user(name: &str, city: &str, age: i64) -> User {
    User {
        name: name.to_string(),
        city: city.to_string(),
        age,
    }
}

pub fn user_key(id: &str) -> Key {
    Key::with_id("Users", id)
}

pub fn user_record(id: &str, data: User) -> Record {
    Record::with_data(user_key(id), data)
}

// =============================================================================
// Database Creation
// =============================================================================

/// Empty in-memory database
pub fn create_test_db() -> MemoryDatabase {
    init_tracing();
    MemoryDatabase::new("test")
}

/// Database holding five users across three cities
pub fn create_seeded_db() -> MemoryDatabase {
    let db = create_test_db();
    let ctx = Context::background();
    let mut records = vec![
        user_record("u1", user("Ann", "Oslo", 31)),
        user_record("u2", user("Bob", "Bergen", 25)),
        user_record("u3", user("Cid", "Oslo", 47)),
        user_record("u4", user("Dag", "Tromso", 19)),
        user_record("u5", user("Eve", "Bergen", 38)),
    ];
    db.set_multi(&ctx, &mut records)
        .expect("Failed to seed test database");
    db
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("dal=debug")
        .try_init();
}

// =============================================================================
// Assertions
// =============================================================================

/// Load a user, panicking when it is missing
pub fn load_user(db: &MemoryDatabase, id: &str) -> User {
    let mut record = user_record(id, User::default());
    db.get(&Context::background(), &mut record)
        .expect("get failed");
    assert!(record.exists(), "user {} should exist", id);
    record.data_as::<User>().cloned().expect("payload is a User")
}

pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.data_as::<User>().map(|u| u.name.clone()).unwrap_or_default())
        .collect()
}
