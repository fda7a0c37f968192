//! Transaction Tests
//!
//! Coordinator semantics of the in-memory adapter:
//! - writes are invisible outside the transaction until commit
//! - worker errors roll back
//! - read-set conflicts are retried up to the attempt budget
//! - the transaction travels in the worker context

use crate::test_utils::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Visibility
// =============================================================================

#[test]
fn test_no_dirty_reads() {
    let db = create_seeded_db();
    let ctx = Context::background();
    db.run_readwrite_transaction(
        &ctx,
        &mut |tx_ctx, tx| {
            tx.set(tx_ctx, &mut user_record("u9", user("Ida", "Oslo", 22)))?;
            // Read your own write
            assert!(tx.exists(tx_ctx, &user_key("u9"))?);
            // Not visible through the database yet
            assert!(!db.exists(&Context::background(), &user_key("u9"))?);
            Ok(())
        },
        &[TxOption::Name("add-ida".into())],
    )
    .unwrap();
    assert!(db.exists(&ctx, &user_key("u9")).unwrap());
}

#[test]
fn test_worker_error_rolls_back() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let err = db
        .run_readwrite_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                tx.delete(tx_ctx, &user_key("u1"))?;
                tx.update(tx_ctx, &user_key("missing"), &[Update::by_field_name("age", 1i64)], &[])
            },
            &[],
        )
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(db.exists(&ctx, &user_key("u1")).unwrap());
}

#[test]
fn test_readonly_transaction_rejects_writes() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let err = db
        .run_readonly_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                let handle = get_transaction(tx_ctx).expect("transaction in context");
                let writer = handle.as_readwrite();
                assert!(writer.is_none());
                assert!(tx.options().is_readonly());
                Err(DalError::not_supported("writes in read-only transactions"))
            },
            &[],
        )
        .unwrap_err();
    assert!(err.is_not_supported());
}

#[test]
fn test_nested_transaction_is_rejected() {
    let db = create_test_db();
    let ctx = Context::background();
    let err = db
        .run_readwrite_transaction(
            &ctx,
            &mut |tx_ctx, _tx| db.run_readonly_transaction(tx_ctx, &mut |_, _| Ok(()), &[]),
            &[],
        )
        .unwrap_err();
    assert!(err.is_not_supported());
}

#[test]
fn test_database_write_inside_worker_runs_outside_transaction() {
    let db = create_test_db();
    let ctx = Context::background();
    let _ = db.run_readwrite_transaction(
        &ctx,
        &mut |tx_ctx, _tx| {
            // Autocommit through the non-transactional context
            db.set(tx_ctx, &mut user_record("u1", user("Ann", "Oslo", 31)))?;
            Err(DalError::validation("abort the outer transaction"))
        },
        &[],
    );
    assert!(db.exists(&ctx, &user_key("u1")).unwrap());
}

// =============================================================================
// Conflicts
// =============================================================================

#[test]
fn test_conflict_without_retry_fails() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let err = db
        .run_readwrite_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                let mut record = user_record("u1", User::default());
                tx.get(tx_ctx, &mut record)?;
                db.update(
                    &Context::background(),
                    &user_key("u1"),
                    &[Update::by_field_name("age", 99i64)],
                    &[],
                )?;
                tx.update(tx_ctx, &user_key("u1"), &[Update::by_field_name("city", "Rome")], &[])
            },
            &[TxOption::Attempts(1)],
        )
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(load_user(&db, "u1"), user("Ann", "Oslo", 99));
}

#[test]
fn test_concurrent_increments_are_serializable() {
    let db = Arc::new(create_test_db());
    let ctx = Context::background();
    db.set(
        &ctx,
        &mut Record::with_data(Key::with_id("Counters", "c"), serde_json::json!({"n": 0})),
    )
    .unwrap();

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..10 {
                    db.run_readwrite_transaction(
                        &Context::background(),
                        &mut |tx_ctx, tx| {
                            let mut record = Record::with_data(
                                Key::with_id("Counters", "c"),
                                serde_json::Value::Null,
                            );
                            tx.get(tx_ctx, &mut record)?;
                            let n = record
                                .data_as::<serde_json::Value>()
                                .and_then(|v| v["n"].as_i64())
                                .unwrap_or_default();
                            tx.set(
                                tx_ctx,
                                &mut Record::with_data(
                                    Key::with_id("Counters", "c"),
                                    serde_json::json!({"n": n + 1}),
                                ),
                            )
                        },
                        &[TxOption::Attempts(1000)],
                    )
                    .expect("increment should eventually commit");
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let stored = db.store().get("Counters/c").unwrap();
    assert_eq!(stored.data["n"], 40);
}

#[test]
fn test_attempts_are_counted() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let attempts = Mutex::new(0u32);
    let err = db
        .run_readwrite_transaction(
            &ctx,
            &mut |tx_ctx, tx| {
                *attempts.lock() += 1;
                let mut record = user_record("u2", User::default());
                tx.get(tx_ctx, &mut record)?;
                // Every attempt loses against a fresh writer
                db.update(
                    &Context::background(),
                    &user_key("u2"),
                    &[Update::by_field_name("age", 1i64)],
                    &[],
                )?;
                tx.set(tx_ctx, &mut user_record("u2", user("Bob", "Rome", 25)))
            },
            &[TxOption::Attempts(3)],
        )
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(*attempts.lock(), 3);
}
