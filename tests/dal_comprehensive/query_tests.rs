//! Query Tests
//!
//! Structured queries run through readers:
//! - filters, IN lists, AND groups
//! - ordering, offset/limit, start cursors
//! - keys-only and column projections
//! - the text form of built queries

use crate::test_utils::*;
use dal::api::{QueryExecutor, ReaderOption};

fn run(db: &MemoryDatabase, query: &Query, options: &[ReaderOption]) -> Vec<Record> {
    let ctx = Context::background();
    let mut reader = db
        .execute_query_to_records_reader(&ctx, query)
        .expect("query should open a reader");
    select_all(&ctx, reader.as_mut(), |r| r, options).expect("query should read")
}

// =============================================================================
// Filtering and ordering
// =============================================================================

#[test]
fn test_filter_and_order() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .where_field("city", Operator::Equal, "Oslo")
        .order_by([descending("age")])
        .select_into_entity::<User>();
    assert_eq!(names(&run(&db, &query, &[])), vec!["Cid", "Ann"]);
}

#[test]
fn test_range_and_in_conditions() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .where_field("age", Operator::GreaterOrEqual, 25i64)
        .where_in_array_field("city", ["Bergen", "Tromso"])
        .order_by([ascending("name")])
        .select_into_entity::<User>();
    assert_eq!(names(&run(&db, &query, &[])), vec!["Bob", "Eve"]);
    assert_eq!(
        query.to_string(),
        "SELECT *\nFROM [Users]\nWHERE (age >= 25 AND city IN ('Bergen','Tromso'))\nORDER BY name"
    );
}

#[test]
fn test_other_collections_are_excluded() {
    let db = create_seeded_db();
    let ctx = Context::background();
    db.set(
        &ctx,
        &mut Record::with_data(Key::with_id("Teams", "t1"), serde_json::json!({"name": "Ops"})),
    )
    .unwrap();
    let query = from("Teams").new_query().select_keys_only(IdKind::String);
    let records = run(&db, &query, &[]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key().collection(), "Teams");
}

// =============================================================================
// Paging
// =============================================================================

#[test]
fn test_query_offset_and_limit() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .order_by([ascending("age")])
        .offset(1)
        .limit(2)
        .select_into_entity::<User>();
    assert_eq!(names(&run(&db, &query, &[])), vec!["Bob", "Ann"]);
}

#[test]
fn test_reader_options_page_the_stream() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .order_by([ascending("name")])
        .select_into_entity::<User>();
    let page = run(&db, &query, &[with_offset(3), with_limit(5)]);
    assert_eq!(names(&page), vec!["Dag", "Eve"]);
    assert!(run(&db, &query, &[with_offset(10)]).is_empty());
}

#[test]
fn test_cursor_resumes_after_last_record() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let builder = from("Users").new_query().order_by([ascending("name")]);

    let mut reader = db
        .execute_query_to_records_reader(&ctx, &builder.clone().limit(2).select_into_entity::<User>())
        .unwrap();
    reader.next_record().unwrap();
    reader.next_record().unwrap();
    let cursor = reader.cursor().unwrap();
    reader.close().unwrap();
    assert_eq!(cursor, "Users/u2");

    let rest = run(&db, &builder.start_from(cursor).select_into_entity::<User>(), &[]);
    assert_eq!(names(&rest), vec!["Cid", "Dag", "Eve"]);
}

#[test]
fn test_unknown_cursor_is_rejected() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .start_from("Users/nope")
        .select_keys_only(IdKind::String);
    let err = db
        .execute_query_to_records_reader(&Context::background(), &query)
        .unwrap_err();
    assert!(matches!(err, DalError::InvalidArgument(_)));
}

// =============================================================================
// Projections
// =============================================================================

#[test]
fn test_select_all_ids() {
    let db = create_seeded_db();
    let ctx = Context::background();
    let query = from("Users")
        .new_query()
        .where_field("city", Operator::Equal, "Bergen")
        .select_keys_only(IdKind::String);
    let mut reader = db.execute_query_to_records_reader(&ctx, &query).unwrap();
    let ids: Vec<String> = select_all_ids(&ctx, reader.as_mut(), &[]).unwrap();
    assert_eq!(ids, vec!["u2", "u5"]);
}

#[test]
fn test_column_projection() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .where_field("name", Operator::Equal, "Eve")
        .select_columns([Column::field("name").with_alias("who"), Column::field("age")]);
    let records = run(&db, &query, &[]);
    let data = records[0].data_as::<JsonMap>().unwrap();
    assert_eq!(data["who"], "Eve");
    assert_eq!(data["age"], 38);
    assert!(data.get("city").is_none());
}

#[test]
fn test_executor_collects_records() {
    let db = create_seeded_db();
    let executor = {
        let db = db.clone();
        QueryExecutor::new(move |ctx: &Context, query: &Query| {
            db.execute_query_to_records_reader(ctx, query)
        })
    };
    let query = from("Users")
        .new_query()
        .where_field("age", Operator::LessThan, 30i64)
        .order_by([ascending("age")])
        .select_into_entity::<User>();
    let records = executor
        .query_all_records(&Context::background(), &query)
        .unwrap();
    assert_eq!(names(&records), vec!["Dag", "Bob"]);
}

#[test]
fn test_query_all_records_through_session() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .order_by([descending("name")])
        .select_into_entity::<User>();
    let records = db
        .query_all_records(&Context::background(), &query, &[with_limit(2)])
        .unwrap();
    assert_eq!(names(&records), vec!["Eve", "Dag"]);
}

#[test]
fn test_group_by_is_not_supported() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .group_by([dal::query::Expression::field("city")])
        .select_columns([Column::field("city")]);
    let err = db
        .execute_query_to_records_reader(&Context::background(), &query)
        .unwrap_err();
    assert!(err.is_not_supported());
}
