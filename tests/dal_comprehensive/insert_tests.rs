//! Generated Id Tests
//!
//! Inserts whose key id is produced by a generator:
//! - taken ids are skipped
//! - the attempt budget is enforced and the id is cleared on failure
//! - adapters fill incomplete keys without a generator

use crate::test_utils::*;
use chrono::{TimeZone, Utc};
use dal::api::{
    random_string_generator_with_prefix, timestamp_generator_with_clock, IdGenerator,
};
use dal::core::TimeAccuracy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Generator cycling through `ids`
fn scripted(ids: &'static [&'static str]) -> IdGenerator {
    let next = AtomicUsize::new(0);
    Arc::new(move |_ctx, record| {
        let i = next.fetch_add(1, Ordering::SeqCst) % ids.len();
        record.key_mut().set_id(ids[i]);
        Ok(())
    })
}

fn new_user(data: User) -> Record {
    Record::with_incomplete_key("Users", IdKind::String, data)
}

#[test]
fn test_taken_ids_are_skipped() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let mut record = new_user(user("Fay", "Oslo", 29));
    db.insert(
        &ctx,
        &mut record,
        InsertOptions::new().with_id_generator(scripted(&["u1", "u2", "u6"])),
    )
    .unwrap();
    assert_eq!(record.key().id().as_str(), Some("u6"));
    assert_eq!(load_user(&db, "u6").name, "Fay");
    assert_eq!(load_user(&db, "u1").name, "Ann");
}

#[test]
fn test_attempt_budget_is_enforced() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let mut record = new_user(user("Fay", "Oslo", 29));
    let err = db
        .insert(
            &ctx,
            &mut record,
            InsertOptions::new()
                .with_id_generator(scripted(&["u1", "u2"]))
                .with_max_attempts(4),
        )
        .unwrap_err();
    assert!(err.is_exceeds_max_number_of_attempts());
    assert!(!record.key().is_complete());
    assert_eq!(db.store().len(), 5);
}

#[test]
fn test_prefixed_random_ids() {
    let db = create_test_db();
    let ctx = Context::background();
    let mut record = new_user(user("Gus", "Oslo", 50));
    db.insert(
        &ctx,
        &mut record,
        InsertOptions::new().with_id_generator(random_string_generator_with_prefix("usr_", 8)),
    )
    .unwrap();
    let id = record.key().id().as_str().unwrap().to_string();
    assert!(id.starts_with("usr_"));
    assert_eq!(id.len(), 12);
    assert!(db.exists(&ctx, &user_key(&id)).unwrap());
}

#[test]
fn test_timestamp_ids() {
    let db = create_test_db();
    let ctx = Context::background();
    let at = Utc.with_ymd_and_hms(1970, 1, 1, 0, 1, 0).unwrap();
    let mut record = new_user(user("Hal", "Oslo", 40));
    db.insert(
        &ctx,
        &mut record,
        InsertOptions::new().with_id_generator(timestamp_generator_with_clock(
            TimeAccuracy::Second,
            16,
            move || at,
        )),
    )
    .unwrap();
    assert_eq!(record.key().id().as_str(), Some("3C"));
}

#[test]
fn test_incomplete_keys_without_generator() {
    let db = create_test_db();
    let ctx = Context::background();

    let mut first = Record::with_incomplete_key("Orders", IdKind::Int, JsonMap::new());
    let mut second = Record::with_incomplete_key("Orders", IdKind::Int, JsonMap::new());
    db.insert(&ctx, &mut first, InsertOptions::new()).unwrap();
    db.insert(&ctx, &mut second, InsertOptions::new()).unwrap();
    assert_eq!(first.key().id(), &KeyId::Int(1));
    assert_eq!(second.key().id(), &KeyId::Int(2));

    let mut named = new_user(user("Ivy", "Oslo", 33));
    db.insert(&ctx, &mut named, InsertOptions::new()).unwrap();
    assert!(named.key().is_complete());
}

#[test]
fn test_insert_multi_in_transaction() {
    let db = create_test_db();
    let ctx = Context::background();
    let mut records = vec![
        new_user(user("Jon", "Oslo", 21)),
        new_user(user("Kim", "Oslo", 22)),
    ];
    db.run_readwrite_transaction(
        &ctx,
        &mut |tx_ctx, tx| tx.insert_multi(tx_ctx, &mut records, InsertOptions::new()),
        &[],
    )
    .unwrap();
    assert_eq!(db.store().len(), 2);
    assert_ne!(records[0].key(), records[1].key());
}
