//! Method-name and literal queries in every result shape.

use ntest::timeout;

use tabledoc_core::dispatch::{Execution, ResultShape};
use tabledoc_core::error::DbError;
use tabledoc_core::query::Pageable;
use tabledoc_core::template::TableTemplate;
use tabledoc_core::types::ObjectValue;

use super::helpers::{
    insert_people, setup, MemoryStore, Order, OrderKey, OrderTotal, Person, PersonName,
};

fn populated(batch_size: usize) -> (std::sync::Arc<MemoryStore>, TableTemplate) {
    let (store, template) = setup(batch_size);
    insert_people(
        &template,
        &[
            ("Ann", "Lee", 31),
            ("Bob", "Lee", 45),
            ("Cat", "Lee", 19),
            ("Cy", "Ode", 20),
            ("Dee", "Ode", 27),
        ],
    );
    (store, template)
}

fn first_names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.first_name.as_str()).collect()
}

#[test]
fn test_collection_with_sort() {
    let (store, template) = populated(2);

    let result = template
        .execute::<Person>("findByLastNameOrderByAgeDesc", vec!["Lee".into()])
        .unwrap();
    let Execution::Collection(people) = result else {
        panic!("expected a collection");
    };
    assert_eq!(first_names(&people), vec!["Bob", "Ann", "Cat"]);
    assert_eq!(
        store.executed().last().unwrap(),
        "DECLARE $p_lastName STRING; SELECT * FROM people t \
         WHERE t.kv_json_.lastName = $p_lastName ORDER BY t.kv_json_.age DESC"
    );
}

#[test]
fn test_conjunction_and_comparison() {
    let (_store, template) = populated(10);

    let older = template
        .execute::<Person>("findByAgeGreaterThanOrderByAgeAsc", vec![ObjectValue::Int(25)])
        .unwrap()
        .into_objects()
        .unwrap();
    assert_eq!(first_names(&older), vec!["Dee", "Ann", "Bob"]);

    let active_lees = template
        .execute::<Person>("findByLastNameAndActiveTrue", vec!["Lee".into()])
        .unwrap()
        .into_objects()
        .unwrap();
    assert_eq!(active_lees.len(), 3);
}

#[test]
fn test_count_and_exists() {
    let (store, template) = populated(10);

    let count = template
        .execute::<Person>("countByLastName", vec!["Ode".into()])
        .unwrap();
    assert!(matches!(count, Execution::Count(2)));

    let exists = template
        .execute::<Person>("existsByLastName", vec!["Lee".into()])
        .unwrap();
    assert!(matches!(exists, Execution::Exists(true)));
    assert!(store.executed().last().unwrap().ends_with("LIMIT 1"));

    let absent = template
        .execute::<Person>("existsByLastName", vec!["Nobody".into()])
        .unwrap();
    assert!(matches!(absent, Execution::Exists(false)));
}

#[test]
fn test_page_with_total() {
    let (store, template) = populated(2);

    let page = template
        .execute_paged::<Person>(
            "findByLastNameOrderByAgeAsc",
            vec!["Lee".into()],
            Pageable::of(0, 2),
        )
        .unwrap();
    assert_eq!(first_names(&page.content), vec!["Cat", "Ann"]);
    assert_eq!(page.total_elements, 3);
    assert_eq!(page.total_pages(), 2);
    assert!(page.has_next());

    let executed = store.executed();
    let count = executed.last().unwrap();
    assert!(count.contains("SELECT count(*) AS count FROM people t"));
    assert!(!count.contains("LIMIT"));

    let last = template
        .execute_paged::<Person>(
            "findByLastNameOrderByAgeAsc",
            vec!["Lee".into()],
            Pageable::of(1, 2),
        )
        .unwrap();
    assert_eq!(first_names(&last.content), vec!["Bob"]);
    assert!(!last.has_next());
}

#[test]
fn test_slice_fetches_one_extra_row() {
    let (_store, template) = populated(10);

    let first = template
        .execute_sliced::<Person>(
            "findByLastNameOrderByAgeAsc",
            vec!["Lee".into()],
            Pageable::of(0, 2),
        )
        .unwrap();
    assert_eq!(first.content.len(), 2);
    assert!(first.has_next);

    let second = template
        .execute_sliced::<Person>(
            "findByLastNameOrderByAgeAsc",
            vec!["Lee".into()],
            Pageable::of(1, 2),
        )
        .unwrap();
    assert_eq!(first_names(&second.content), vec!["Bob"]);
    assert!(!second.has_next);
}

#[test]
fn test_zero_page_size_is_rejected() {
    let (_store, template) = populated(10);
    let result =
        template.execute_paged::<Person>("findByLastName", vec!["Lee".into()], Pageable::of(0, 0));
    assert!(matches!(result, Err(DbError::InvalidQuery(_))));
}

#[test]
fn test_delete_query_returns_removed_entities() {
    let (store, template) = populated(10);

    let result = template
        .execute::<Person>("deleteByLastName", vec!["Ode".into()])
        .unwrap();
    let Execution::Deleted(removed) = result else {
        panic!("expected deleted entities");
    };
    let mut names = first_names(&removed);
    names.sort();
    assert_eq!(names, vec!["Cy", "Dee"]);
    assert_eq!(store.row_count("people"), 3);
}

#[test]
fn test_projection_onto_names() {
    let (store, template) = populated(10);

    let names = template
        .execute_projected::<Person, PersonName>("findByLastNameOrderByAgeAsc", vec!["Ode".into()])
        .unwrap()
        .into_objects()
        .unwrap();
    assert_eq!(
        names,
        vec![
            PersonName {
                first_name: "Cy".to_string(),
                last_name: "Ode".to_string(),
            },
            PersonName {
                first_name: "Dee".to_string(),
                last_name: "Ode".to_string(),
            },
        ]
    );
    assert!(store.executed().last().unwrap().contains(
        "SELECT {\"firstName\": t.kv_json_.firstName, \"lastName\": t.kv_json_.lastName} AS kv_json_"
    ));
}

#[test]
fn test_projection_rebuilds_composite_id() {
    let (store, template) = setup(10);
    template.insert(Order::new("eu", 1, 9.5)).unwrap();
    template.insert(Order::new("eu", 2, 20.0)).unwrap();
    template.insert(Order::new("us", 1, 3.0)).unwrap();

    let totals = template
        .execute_projected::<Order, OrderTotal>("findByRegionOrderByNumberDesc", vec!["eu".into()])
        .unwrap()
        .into_objects()
        .unwrap();
    let key = |number| OrderKey {
        region: "eu".to_string(),
        number,
    };
    assert_eq!(
        totals,
        vec![
            OrderTotal {
                key: key(2),
                total: 20.0,
            },
            OrderTotal {
                key: key(1),
                total: 9.5,
            },
        ]
    );
    assert!(store
        .executed()
        .last()
        .unwrap()
        .starts_with("DECLARE $p_region STRING; SELECT t.region, t.number, {\"total\": t.kv_json_.total}"));
}

#[test]
fn test_prepared_handle_is_reused() {
    let (store, template) = populated(10);

    for _ in 0..3 {
        template
            .execute::<Person>("findByLastName", vec!["Lee".into()])
            .unwrap();
    }
    assert_eq!(store.prepare_count(), 1);
    assert_eq!(template.cache().len(), 1);
}

#[timeout(5000)]
#[test]
fn test_stale_handle_is_prepared_again() {
    let (store, template) = populated(10);
    store.fail_next_queries(1);

    let people = template
        .execute::<Person>("findByLastName", vec!["Lee".into()])
        .unwrap()
        .into_objects()
        .unwrap();
    assert_eq!(people.len(), 3);
    assert_eq!(store.prepare_count(), 2);
}

#[test]
fn test_repeated_stale_handle_fails() {
    let (store, template) = populated(10);
    store.fail_next_queries(2);

    let result = template.execute::<Person>("findByLastName", vec!["Lee".into()]);
    let error = result.unwrap_err();
    assert!(!error.is_retryable());
    assert!(matches!(error, DbError::Permanent(_)));
}

#[test]
fn test_literal_query_shapes() {
    let (_store, template) = populated(10);
    let text = "DECLARE $last STRING; SELECT * FROM people t WHERE t.kv_json_.lastName = $last";
    let args = || vec![(Some("last".to_string()), ObjectValue::from("Ode"))];

    let people = template
        .execute_literal::<Person>(text, args(), ResultShape::Collection)
        .unwrap()
        .into_objects()
        .unwrap();
    assert_eq!(people.len(), 2);

    let exists = template
        .execute_literal::<Person>(text, args(), ResultShape::Exists)
        .unwrap();
    assert!(matches!(exists, Execution::Exists(true)));

    let paged = template.execute_literal::<Person>(text, args(), ResultShape::Page(Pageable::of(0, 1)));
    assert!(matches!(paged, Err(DbError::InvalidQuery(_))));
}

#[test]
fn test_method_name_errors() {
    let (_store, template) = populated(10);

    let arity = template.execute::<Person>("findByLastName", vec![]);
    assert!(matches!(arity, Err(DbError::InvalidQuery(_))));

    let unknown = template.execute::<Person>("findByNickname", vec!["x".into()]);
    assert!(unknown.is_err());

    let prefix = template.execute::<Person>("fetchByLastName", vec!["x".into()]);
    assert!(prefix.is_err());
}
