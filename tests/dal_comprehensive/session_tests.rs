//! Session Tests
//!
//! Record-level operations through the database session:
//! - get/get_multi attach per-record status
//! - set overwrites, insert refuses existing records
//! - updates, transforms and preconditions
//! - delete is idempotent

use crate::test_utils::*;
use dal::core::transform::{array_union, increment};
use dal::core::DELETE_FIELD;

// =============================================================================
// Reads
// =============================================================================

#[test]
fn test_get_existing_and_missing() {
    let db = create_seeded_db();
    let ctx = Context::background();

    assert_eq!(load_user(&db, "u1"), user("Ann", "Oslo", 31));

    let mut missing = user_record("nobody", User::default());
    db.get(&ctx, &mut missing).unwrap();
    assert!(!missing.exists());
    assert!(missing.error().is_none());
}

#[test]
fn test_get_multi_sets_status_per_record() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let mut records = vec![
        user_record("u2", User::default()),
        user_record("zz", User::default()),
        user_record("u4", User::default()),
    ];
    db.get_multi(&ctx, &mut records).unwrap();
    let exists: Vec<bool> = records.iter().map(|r| r.exists()).collect();
    assert_eq!(exists, vec![true, false, true]);
    assert_eq!(names(&records)[2], "Dag");
}

#[test]
fn test_exists() {
    let db = create_seeded_db();
    let ctx = Context::background();
    assert!(db.exists(&ctx, &user_key("u3")).unwrap());
    assert!(!db.exists(&ctx, &user_key("u9")).unwrap());
}

#[test]
fn test_cancelled_context_aborts_read() {
    let db = create_seeded_db();
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();
    let mut record = user_record("u1", User::default());
    let err = db.get(&ctx, &mut record).unwrap_err();
    assert!(err.is_cancelled());
}

// =============================================================================
// Writes
// =============================================================================

#[test]
fn test_set_overwrites() {
    let db = create_seeded_db();
    let ctx = Context::background();
    db.set(&ctx, &mut user_record("u1", user("Ann", "Paris", 32)))
        .unwrap();
    assert_eq!(load_user(&db, "u1").city, "Paris");
}

#[test]
fn test_set_runs_entity_validation() {
    let db = create_test_db();
    let ctx = Context::background();
    let err = db
        .set(&ctx, &mut user_record("u1", user("", "Oslo", 1)))
        .unwrap_err();
    assert!(err.chain().any(|e| matches!(e, DalError::Validation(_))));
    assert!(!db.exists(&ctx, &user_key("u1")).unwrap());
}

#[test]
fn test_insert_refuses_existing_record() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let err = db
        .insert(
            &ctx,
            &mut user_record("u1", user("Ann", "Oslo", 31)),
            InsertOptions::new(),
        )
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[test]
fn test_delete_is_idempotent() {
    let db = create_seeded_db();
    let ctx = Context::background();
    db.delete(&ctx, &user_key("u1")).unwrap();
    db.delete(&ctx, &user_key("u1")).unwrap();
    db.delete_multi(&ctx, &[user_key("u2"), user_key("u3")])
        .unwrap();
    assert_eq!(db.store().len(), 2);
}

// =============================================================================
// Updates
// =============================================================================

#[test]
fn test_update_fields() {
    let db = create_seeded_db();
    let ctx = Context::background();
    db.update(
        &ctx,
        &user_key("u2"),
        &[
            Update::by_field_name("city", "Oslo"),
            Update::by_field_name("age", increment(1i64)),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(load_user(&db, "u2"), user("Bob", "Oslo", 26));
}

#[test]
fn test_update_record_reloads_payload() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let mut record = user_record("u3", User::default());
    db.update_record(&ctx, &mut record, &[Update::by_field_name("age", 48i64)], &[])
        .unwrap();
    assert_eq!(record.data_as::<User>().unwrap().age, 48);
    assert_eq!(record.data_as::<User>().unwrap().name, "Cid");
}

#[test]
fn test_update_missing_record() {
    let db = create_test_db();
    let ctx = Context::background();
    let updates = [Update::by_field_name("age", 1i64)];

    let err = db.update(&ctx, &user_key("u1"), &updates, &[]).unwrap_err();
    assert!(err.is_not_found());

    let err = db
        .update(&ctx, &user_key("u1"), &updates, &[with_exists_precondition()])
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[test]
fn test_update_multi_and_transforms() {
    let db = create_test_db();
    let ctx = Context::background();
    let mut records = vec![
        Record::with_data(Key::with_id("Posts", "p1"), JsonMap::new()),
        Record::with_data(Key::with_id("Posts", "p2"), JsonMap::new()),
    ];
    db.set_multi(&ctx, &mut records).unwrap();

    let keys = [Key::with_id("Posts", "p1"), Key::with_id("Posts", "p2")];
    db.update_multi(
        &ctx,
        &keys,
        &[Update::by_field_name("tags", array_union(["rust", "dal"]))],
        &[],
    )
    .unwrap();
    db.update(
        &ctx,
        &keys[0],
        &[
            Update::by_field_name("tags", array_union(["dal", "db"])),
            Update::by_field_name("draft", DELETE_FIELD),
        ],
        &[],
    )
    .unwrap();

    let stored = db.store().get("Posts/p1").unwrap();
    assert_eq!(stored.data["tags"], serde_json::json!(["rust", "dal", "db"]));
    let stored = db.store().get("Posts/p2").unwrap();
    assert_eq!(stored.data["tags"], serde_json::json!(["rust", "dal"]));
}

#[test]
fn test_last_update_time_precondition() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let updated_at = db.store().get("Users/u1").unwrap().update_time;

    db.update(
        &ctx,
        &user_key("u1"),
        &[Update::by_field_name("age", 32i64)],
        &[with_last_update_time_precondition(updated_at)],
    )
    .unwrap();

    // The first update moved the timestamp
    let err = db
        .update(
            &ctx,
            &user_key("u1"),
            &[Update::by_field_name("age", 33i64)],
            &[with_last_update_time_precondition(updated_at)],
        )
        .unwrap_err();
    assert!(err.is_precondition_failed());
    assert_eq!(load_user(&db, "u1").age, 32);
}
