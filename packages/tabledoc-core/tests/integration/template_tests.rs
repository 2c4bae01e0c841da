//! Entity operations through `TableTemplate`.

use ntest::timeout;

use tabledoc_core::error::DbError;
use tabledoc_core::types::ObjectValue;

use super::helpers::{created_tables, insert_people, setup, Account, Order, OrderKey, Person};

#[test]
fn test_insert_generates_identity_and_reads_back() {
    let (store, template) = setup(10);

    let ann = template.insert(Person::new("Ann", "Lee", 31)).unwrap();
    let bob = template.insert(Person::new("Bob", "Lee", 45)).unwrap();
    assert_eq!(ann.id, Some(1));
    assert_eq!(bob.id, Some(2));
    assert_eq!(store.row_count("people"), 2);

    let found: Option<Person> = template.find_by_id(2i64).unwrap();
    assert_eq!(found, Some(bob));
    let missing: Option<Person> = template.find_by_id(99i64).unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_generated_string_id_is_a_uuid() {
    let (store, template) = setup(10);

    let account = template
        .insert(Account {
            id: None,
            owner: "ann".to_string(),
        })
        .unwrap();
    let id = account.id.clone().expect("generated id");
    assert!(uuid::Uuid::parse_str(&id).is_ok(), "not a UUID: {}", id);
    assert!(store.ddl_statements()[0].contains("id STRING AS UUID GENERATED BY DEFAULT"));

    let found: Option<Account> = template.find_by_id(id).unwrap();
    assert_eq!(found, Some(account));
}

#[test]
fn test_update_existing_and_missing() {
    let (_store, template) = setup(10);
    let mut ann = template.insert(Person::new("Ann", "Lee", 31)).unwrap();

    ann.age = 32;
    ann.active = false;
    template.update(&ann).unwrap();
    let found: Option<Person> = template.find_by_id(ann.id.unwrap()).unwrap();
    assert_eq!(found, Some(ann));

    let mut ghost = Person::new("Gus", "Host", 1);
    ghost.id = Some(77);
    let result = template.update(&ghost);
    assert!(matches!(result, Err(DbError::RowNotPresent { ref table }) if table == "people"));

    let no_id = template.update(&Person::new("No", "Id", 1));
    assert!(matches!(no_id, Err(DbError::MissingId { .. })));
}

#[test]
fn test_delete_by_id() {
    let (store, template) = setup(10);
    let people = insert_people(&template, &[("Ann", "Lee", 31), ("Bob", "Lee", 45)]);

    assert!(template.delete_by_id::<Person>(people[0].id.unwrap()).unwrap());
    assert!(!template.delete_by_id::<Person>(people[0].id.unwrap()).unwrap());
    assert_eq!(store.row_count("people"), 1);

    let null_id = template.delete_by_id::<Person>(ObjectValue::Null);
    assert!(matches!(null_id, Err(DbError::MissingId { .. })));
}

#[timeout(5000)]
#[test]
fn test_find_all_spans_batches() {
    let (_store, template) = setup(2);
    insert_people(
        &template,
        &[
            ("Ann", "Lee", 31),
            ("Bob", "Lee", 45),
            ("Cy", "Ode", 20),
            ("Dee", "Ode", 27),
            ("Eve", "Park", 52),
        ],
    );

    let mut all: Vec<Person> = template.find_all().unwrap();
    all.sort_by_key(|p| p.id);
    assert_eq!(all.len(), 5);
    assert_eq!(all[4].first_name, "Eve");
}

#[test]
fn test_delete_all_reports_count() {
    let (store, template) = setup(10);
    insert_people(&template, &[("Ann", "Lee", 31), ("Bob", "Lee", 45), ("Cy", "Ode", 20)]);

    assert_eq!(template.delete_all::<Person>().unwrap(), 3);
    assert_eq!(store.row_count("people"), 0);
    assert!(store.executed().contains(&"DELETE FROM people".to_string()));
}

#[test]
fn test_composite_key_and_shard_delete() {
    let (store, template) = setup(10);
    let first = template.insert(Order::new("eu", 1, 9.5)).unwrap();
    template.insert(Order::new("eu", 2, 20.0)).unwrap();
    template.insert(Order::new("us", 1, 3.0)).unwrap();
    assert!(store.ddl_statements()[0].contains("PRIMARY KEY(SHARD(region), number)"));

    let key = OrderKey {
        region: "eu".to_string(),
        number: 1,
    };
    let found: Option<Order> = template.find_by_id(ObjectValue::object(key)).unwrap();
    assert_eq!(found, Some(first));

    let deleted = template
        .delete_in_shard::<Order>(&[("region", ObjectValue::from("eu"))])
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.row_count("orders"), 1);
}

#[test]
fn test_shard_delete_requires_exact_shard_key() {
    let (_store, template) = setup(10);

    let empty = template.delete_in_shard::<Order>(&[]);
    assert!(matches!(empty, Err(DbError::InvalidQuery(_))));

    let too_many = template.delete_in_shard::<Order>(&[
        ("region", ObjectValue::from("eu")),
        ("number", ObjectValue::Long(1)),
    ]);
    assert!(matches!(too_many, Err(DbError::InvalidQuery(_))));
}

#[test]
fn test_tables_are_created_once_on_first_use() {
    let (store, template) = setup(10);
    insert_people(&template, &[("Ann", "Lee", 31)]);
    let _: Vec<Person> = template.find_all().unwrap();
    template.delete_all::<Person>().unwrap();

    let creates = store
        .ddl_statements()
        .iter()
        .filter(|s| s.starts_with("CREATE TABLE IF NOT EXISTS people"))
        .count();
    assert_eq!(creates, 1);
    assert!(!created_tables(&store).contains("accounts"));

    template.drop_table_if_exists::<Person>().unwrap();
    insert_people(&template, &[("Bob", "Lee", 45)]);
    let creates = store
        .ddl_statements()
        .iter()
        .filter(|s| s.starts_with("CREATE TABLE IF NOT EXISTS people"))
        .count();
    assert_eq!(creates, 2);
}

#[test]
fn test_query_rows_with_named_arguments() {
    let (_store, template) = setup(10);
    insert_people(&template, &[("Ann", "Lee", 31), ("Bob", "Lee", 45), ("Cy", "Ode", 20)]);

    let rows = template
        .query_rows(
            "DECLARE $last STRING; SELECT * FROM people t WHERE t.kv_json_.lastName = $last",
            vec![(Some("last".to_string()), ObjectValue::from("Lee"))],
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.document().is_some()));

    let positional = template.query_rows("SELECT * FROM people t WHERE t.id = ?", vec![]);
    assert!(matches!(positional, Err(DbError::InvalidQuery(_))));
}
