//! Recordset Tests
//!
//! Query results read into columnar recordsets:
//! - caller-provided column templates (dense, bitmap, boolean)
//! - derived columns when no template is given
//! - aggregates and source-less selects

use crate::test_utils::*;
use dal::query::{count_all, max, sum, Expression};
use dal::recordset::{
    bitmap, boolean, dense, read_all_rows, Recordset, RecordsetOptions, RecordsetReader,
};

fn read(db: &MemoryDatabase, query: &Query, options: RecordsetOptions) -> Box<dyn RecordsetReader> {
    let mut reader = db
        .execute_query_to_recordset_reader(&Context::background(), query, options)
        .expect("recordset reader should open");
    read_all_rows(reader.as_mut()).expect("rows should read");
    reader
}

#[test]
fn test_template_columns() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .order_by([ascending("age")])
        .select_columns([Column::field("name"), Column::field("city"), Column::field("age")]);
    let options = RecordsetOptions::new()
        .with_column(dense("name", String::new()))
        .with_column(bitmap("city", String::new()))
        .with_column(dense("age", 0i64));
    let reader = read(&db, &query, options);
    let rs = reader.recordset();

    assert_eq!(rs.rows_count(), 5);
    let first = rs.get_row(0).unwrap();
    assert_eq!(first.get_value_by_name(rs, "name").unwrap(), Value::from("Dag"));
    assert_eq!(first.get_value_by_name(rs, "city").unwrap(), Value::from("Tromso"));
    assert_eq!(rs.get_value(4, 2).unwrap(), Value::Int(47));
}

#[test]
fn test_boolean_column_from_projection() {
    let db = create_test_db();
    let ctx = Context::background();
    let mut records = vec![
        Record::with_data(Key::with_id("Flags", "a"), serde_json::json!({"on": true})),
        Record::with_data(Key::with_id("Flags", "b"), serde_json::json!({"on": false})),
        Record::with_data(Key::with_id("Flags", "c"), serde_json::json!({})),
    ];
    db.set_multi(&ctx, &mut records).unwrap();

    let query = from("Flags")
        .new_query()
        .select_columns([Column::field("on")]);
    let reader = read(&db, &query, RecordsetOptions::new().with_column(boolean("on", false)));
    let rs = reader.recordset();
    let values: Vec<Value> = (0..rs.rows_count())
        .map(|row| rs.get_value(row, 0).unwrap())
        .collect();
    assert_eq!(values, vec![Value::Bool(true), Value::Bool(false), Value::Bool(false)]);
}

#[test]
fn test_derived_columns_without_template() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .where_field("city", Operator::Equal, "Bergen")
        .select_keys_only(IdKind::String);
    let mut reader = db
        .execute_query_to_recordset_reader(&Context::background(), &query, RecordsetOptions::new())
        .unwrap();
    assert_eq!(read_all_rows(reader.as_mut()).unwrap(), 2);
    let rs = reader.recordset();
    let id = rs.column_index("$id").expect("$id column");
    assert_eq!(rs.get_value(0, id).unwrap(), Value::from("u2"));
    assert_eq!(rs.get_value(1, id).unwrap(), Value::from("u5"));
}

#[test]
fn test_aggregates() {
    let db = create_seeded_db();
    let query = from("Users").new_query().select_columns([
        Column::new(count_all()).with_alias("n"),
        Column::new(sum(Expression::field("age"))).with_alias("total"),
        Column::new(max(Expression::field("city"))),
    ]);
    let reader = read(&db, &query, RecordsetOptions::new());
    let rs = reader.recordset();
    assert_eq!(rs.rows_count(), 1);
    let row = rs.get_row(0).unwrap();
    assert_eq!(row.get_value_by_name(rs, "n").unwrap(), Value::Int(5));
    assert_eq!(row.get_value_by_name(rs, "total").unwrap(), Value::Int(160));
    assert_eq!(row.get_value_by_name(rs, "MAX(city)").unwrap(), Value::from("Tromso"));
}

#[test]
fn test_filtered_count() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .where_field("city", Operator::Equal, "Oslo")
        .select_columns([Column::new(count_all()).with_alias("n")]);
    let reader = read(&db, &query, RecordsetOptions::new().with_column(dense("n", 0i64)));
    assert_eq!(reader.recordset().get_value(0, 0).unwrap(), Value::Int(2));
}

#[test]
fn test_select_without_source() {
    let db = create_test_db();
    let query = Query::select([Column::new(Expression::constant(1i64)).with_alias("one")]);
    let reader = read(&db, &query, RecordsetOptions::new());
    let rs = reader.recordset();
    assert_eq!(rs.rows_count(), 1);
    assert_eq!(rs.get_value(0, 0).unwrap(), Value::Int(1));
}

#[test]
fn test_type_mismatch_is_reported() {
    let db = create_seeded_db();
    let query = from("Users")
        .new_query()
        .select_columns([Column::field("name")]);
    let mut reader = db
        .execute_query_to_recordset_reader(
            &Context::background(),
            &query,
            RecordsetOptions::new().with_column(dense("name", 0i64)),
        )
        .unwrap();
    assert!(read_all_rows(reader.as_mut()).is_err());
}
