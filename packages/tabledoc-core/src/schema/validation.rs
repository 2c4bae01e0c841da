//! Validation of an existing table against an entity.

use crate::error::DbError;
use crate::mapping::{EntityDescriptor, IdGeneration, DOCUMENT_COLUMN};

use super::table_schema::TableSchema;

/// Compares an existing table with the layout derived from `entity`.
///
/// # Arguments
/// * `entity` - Descriptor of the entity stored in the table
/// * `discovered` - Schema reported by the store
///
/// # Returns
/// Every discrepancy found; empty when the table matches. A TTL
/// difference is only logged.
pub fn validate_existing(entity: &EntityDescriptor, discovered: &TableSchema) -> Vec<String> {
    let mut mismatches = Vec::new();

    // Shard and non-shard keys, order-sensitive
    let shard: Vec<&str> = entity.shard_keys().map(|c| c.name.as_str()).collect();
    if !same_names(&shard, &discovered.shard_key) {
        mismatches.push(format!(
            "shard primary keys mismatch: expected [{}], found [{}]",
            shard.join(", "),
            discovered.shard_key.join(", ")
        ));
    }
    let non_shard: Vec<&str> = entity.non_shard_keys().map(|c| c.name.as_str()).collect();
    if !same_names(&non_shard, discovered.non_shard_key()) {
        mismatches.push(format!(
            "non-shard primary keys mismatch: expected [{}], found [{}]",
            non_shard.join(", "),
            discovered.non_shard_key().join(", ")
        ));
    }

    // Key column types
    for column in entity.key_columns() {
        match discovered.column(&column.name) {
            Some(found) if !found.column_type.eq_ignore_ascii_case(column.sql_type) => {
                mismatches.push(format!(
                    "column '{}': expected type {}, found {}",
                    column.name, column.sql_type, found.column_type
                ));
            }
            Some(_) => {}
            None => mismatches.push(format!("column '{}' is missing", column.name)),
        }
    }

    // Exactly the document column outside the primary key
    let others: Vec<_> = discovered.other_columns().collect();
    let document_only = matches!(
        others.as_slice(),
        [only] if only.name.eq_ignore_ascii_case(DOCUMENT_COLUMN)
            && only.column_type.eq_ignore_ascii_case("JSON")
    );
    if !document_only {
        let found: Vec<String> = others
            .iter()
            .map(|c| format!("{} {}", c.name, c.column_type))
            .collect();
        mismatches.push(format!(
            "non-key columns: expected [{} JSON], found [{}]",
            DOCUMENT_COLUMN,
            found.join(", ")
        ));
    }

    validate_generation(entity, discovered, &mut mismatches);

    match discovered.parsed_ttl() {
        Ok(found) => {
            let expected = entity.ttl().map(|t| t.as_hours()).unwrap_or(0);
            let actual = found.map(|t| t.as_hours()).unwrap_or(0);
            if expected != actual {
                tracing::warn!(
                    "Table '{}' TTL differs from entity '{}': expected {:?}, found {:?}",
                    discovered.name,
                    entity.type_name(),
                    entity.ttl().map(|t| t.to_string()),
                    discovered.ttl
                );
            }
        }
        Err(e) => tracing::warn!("Table '{}' has an unreadable TTL: {}", discovered.name, e),
    }

    mismatches
}

/// Like [`validate_existing`], failing with every discrepancy at once.
pub fn ensure_matches(entity: &EntityDescriptor, discovered: &TableSchema) -> Result<(), DbError> {
    let mismatches = validate_existing(entity, discovered);
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(DbError::SchemaMismatch {
            table: entity.table_name().to_string(),
            mismatches,
        })
    }
}

fn validate_generation(
    entity: &EntityDescriptor,
    discovered: &TableSchema,
    mismatches: &mut Vec<String>,
) {
    let id_column = entity
        .key_columns()
        .first()
        .filter(|_| !entity.is_composite())
        .map(|c| c.name.as_str());

    let identity = discovered.identity.as_ref().map(|i| i.name.as_str());
    let expects_identity = entity.generation() == Some(IdGeneration::Identity);
    match (expects_identity, identity) {
        (true, Some(found)) if id_column.is_some_and(|id| id.eq_ignore_ascii_case(found)) => {}
        (true, found) => mismatches.push(format!(
            "identity column: expected {}, found {}",
            id_column.unwrap_or("-"),
            found.unwrap_or("none")
        )),
        (false, Some(found)) => mismatches.push(format!(
            "identity column: expected none, found {}",
            found
        )),
        (false, None) => {}
    }

    let uuid_column = discovered
        .fields
        .iter()
        .find(|c| c.as_uuid && c.generated)
        .map(|c| c.name.as_str());
    let expects_uuid = entity.generation() == Some(IdGeneration::Uuid);
    match (expects_uuid, uuid_column) {
        (true, Some(found)) if id_column.is_some_and(|id| id.eq_ignore_ascii_case(found)) => {}
        (true, found) => mismatches.push(format!(
            "generated UUID column: expected {}, found {}",
            id_column.unwrap_or("-"),
            found.unwrap_or("none")
        )),
        (false, Some(found)) => mismatches.push(format!(
            "generated UUID column: expected none, found {}",
            found
        )),
        (false, None) => {}
    }
}

fn same_names(expected: &[&str], found: &[String]) -> bool {
    expected.len() == found.len()
        && expected
            .iter()
            .zip(found)
            .all(|(e, f)| e.eq_ignore_ascii_case(f))
}
