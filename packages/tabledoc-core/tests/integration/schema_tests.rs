//! Table creation, validation of existing tables and removal.

use tabledoc_core::error::{DbError, ErrorKind};
use tabledoc_core::schema::{ColumnSchema, IdentitySchema, TableSchema};

use super::helpers::{created_tables, insert_people, setup, Account, Person};

fn column(name: &str, column_type: &str) -> ColumnSchema {
    ColumnSchema {
        name: name.to_string(),
        column_type: column_type.to_string(),
        nullable: false,
        as_uuid: false,
        generated: false,
    }
}

fn people_schema() -> TableSchema {
    TableSchema {
        name: "people".to_string(),
        ttl: None,
        shard_key: vec!["id".to_string()],
        primary_key: vec!["id".to_string()],
        fields: vec![column("id", "LONG"), column("kv_json_", "JSON")],
        identity: Some(IdentitySchema {
            name: "id".to_string(),
            always: true,
            no_cycle: true,
        }),
    }
}

#[test]
fn test_create_issues_ddl_for_missing_table() {
    let (store, template) = setup(10);

    assert!(template.create_table_if_absent::<Person>().unwrap());
    assert_eq!(
        store.ddl_statements(),
        vec![
            "CREATE TABLE IF NOT EXISTS people (id LONG GENERATED ALWAYS AS IDENTITY (NO CYCLE), \
             kv_json_ JSON, PRIMARY KEY(SHARD(id)))"
                .to_string()
        ]
    );
}

#[test]
fn test_matching_table_is_left_alone() {
    let (store, template) = setup(10);
    store.seed_schema(people_schema());

    assert!(!template.create_table_if_absent::<Person>().unwrap());
    insert_people(&template, &[("Ann", "Lee", 31)]);
    assert!(store.ddl_statements().is_empty());
}

#[test]
fn test_mismatched_table_reports_every_difference() {
    let (store, template) = setup(10);
    let mut schema = people_schema();
    schema.identity = None;
    schema.fields.push(column("email", "STRING"));
    store.seed_schema(schema);

    let error = template.create_table_if_absent::<Person>().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Configuration);
    let DbError::SchemaMismatch { table, mismatches } = error else {
        panic!("expected a schema mismatch");
    };
    assert_eq!(table, "people");
    assert_eq!(mismatches.len(), 2, "{:?}", mismatches);
    assert!(mismatches.iter().any(|m| m.contains("identity column")));
    assert!(mismatches.iter().any(|m| m.contains("email")));

    // Auto-create on first use validates the same way
    let insert = template.insert(Person::new("Ann", "Lee", 31));
    assert!(matches!(insert, Err(DbError::SchemaMismatch { .. })));
    assert!(store.ddl_statements().is_empty());
}

#[test]
fn test_ddl_clears_prepared_queries() {
    let (store, template) = setup(10);
    insert_people(&template, &[("Ann", "Lee", 31)]);
    template
        .execute::<Person>("findByLastName", vec!["Lee".into()])
        .unwrap();
    assert_eq!(template.cache().len(), 1);

    template.create_table_if_absent::<Account>().unwrap();
    assert!(template.cache().is_empty());
    assert!(created_tables(&store).contains("accounts"));

    template
        .execute::<Person>("findByLastName", vec!["Lee".into()])
        .unwrap();
    assert_eq!(template.cache().len(), 1);

    template.drop_table_if_exists::<Person>().unwrap();
    assert!(template.cache().is_empty());
    assert_eq!(
        store.ddl_statements().last().map(String::as_str),
        Some("DROP TABLE IF EXISTS people")
    );
    assert_eq!(store.row_count("people"), 0);
}
