use std::sync::Arc;

use sqlstream_dialect::presets;
use sqlstream_duck::DuckSource;
use sqlstream_engine::{
    Delete, GeneratedKeys, Insert, PartitionStrategy, QueryContext, RawRow, RawRowMapper, Table,
    Update,
};
use sqlstream_ir::{Field, Value};

const AGE: Field<i64> = Field::new("age");
const NAME: Field<String> = Field::new("name");

fn table() -> Table<RawRow> {
    let source = Arc::new(DuckSource::open_in_memory().unwrap());
    source
        .execute_batch(
            "CREATE SEQUENCE people_id START 1;
             CREATE TABLE people (
                 id INTEGER DEFAULT nextval('people_id'),
                 name VARCHAR,
                 age INTEGER
             );",
        )
        .unwrap();
    let schema = source.table_schema("people").unwrap();
    Table::new(
        source,
        QueryContext::for_table(schema, Arc::new(presets::duckdb())),
        RawRowMapper,
    )
}

#[test]
fn test_insert_returns_generated_keys() {
    let people = table();

    let mut keys = GeneratedKeys::new();
    for (name, age) in [("ann", 30), ("bob", 12), ("cy", 70)] {
        let insert = Insert::new().value("name", name).value("age", age).returning("id");
        let (affected, next) = people.insert(&insert, keys).unwrap();
        assert_eq!(affected, 1);
        keys = next;
    }
    assert_eq!(keys.keys(), [Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(people.query().count().unwrap(), 3);
}

#[test]
fn test_update_and_delete() {
    let people = table();
    for (name, age) in [("ann", 30), ("bob", 12), ("cy", 70)] {
        people
            .insert(&Insert::new().value("name", name).value("age", age), GeneratedKeys::new())
            .unwrap();
    }

    let updated = people
        .update(&Update::new().set("age", 13).filter(NAME.equal("bob".to_string())))
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(people.query().filter(AGE.equal(13)).count().unwrap(), 1);

    let deleted = people.delete(&Delete::new().filter(AGE.less_than(18))).unwrap();
    assert_eq!(deleted, 1);

    let names: Vec<String> = people
        .query()
        .sorted([NAME.asc()])
        .collect()
        .unwrap()
        .iter()
        .map(|row| row.get_string("name").unwrap())
        .collect();
    assert_eq!(names, vec!["ann", "cy"]);
}

#[test]
fn test_partitioned_stream_covers_every_row() {
    let people = table();
    for age in 0..10 {
        people
            .insert(&Insert::new().value("age", age), GeneratedKeys::new())
            .unwrap();
    }

    let parts = people
        .query()
        .filter(AGE.greater_or_equal(2))
        .stream()
        .unwrap()
        .partition(PartitionStrategy::FixedSegments(3));
    assert_eq!(parts.len(), 3);

    let mut ages: Vec<i64> = parts
        .into_iter()
        .flat_map(|part| part.map(|row| row.unwrap().get_i64("age").unwrap()))
        .collect();
    ages.sort_unstable();
    assert_eq!(ages, (2..10).collect::<Vec<_>>());
}
