//! DDL derivation.

use crate::mapping::{EntityDescriptor, IdGeneration, KeyColumn, DOCUMENT_COLUMN};

/// Derives the `CREATE TABLE` statement of an entity.
///
/// Columns are the shard keys, the non-shard keys and the document column,
/// in that order; the TTL clause is added when the entity declares one.
pub fn create_table_ddl(entity: &EntityDescriptor) -> String {
    let mut columns: Vec<String> = entity
        .key_columns()
        .iter()
        .map(|column| column_definition(entity, column))
        .collect();
    columns.push(format!("{} JSON", DOCUMENT_COLUMN));

    let shard: Vec<&str> = entity.shard_keys().map(|c| c.name.as_str()).collect();
    let mut primary_key = format!("SHARD({})", shard.join(", "));
    for column in entity.non_shard_keys() {
        primary_key.push_str(", ");
        primary_key.push_str(&column.name);
    }
    columns.push(format!("PRIMARY KEY({})", primary_key));

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        entity.table_name(),
        columns.join(", ")
    );
    if let Some(ttl) = entity.ttl() {
        ddl.push_str(&format!(" USING TTL {}", ttl));
    }
    ddl
}

/// Derives the `DROP TABLE` statement of an entity.
pub fn drop_table_ddl(entity: &EntityDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {}", entity.table_name())
}

fn column_definition(entity: &EntityDescriptor, column: &KeyColumn) -> String {
    let generated = column.property.is_id && !entity.is_composite();
    match entity.generation() {
        Some(IdGeneration::Identity) if generated => format!(
            "{} {} GENERATED ALWAYS AS IDENTITY (NO CYCLE)",
            column.name, column.sql_type
        ),
        Some(IdGeneration::Uuid) if generated => {
            format!("{} {} AS UUID GENERATED BY DEFAULT", column.name, column.sql_type)
        }
        _ => format!("{} {}", column.name, column.sql_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::MapperConfig;
    use crate::mapping::{
        KeyAnnotation, PropertyDecl, TableOptions, Ttl, TypeDefinition, TypeInfo, TypeRegistry,
    };
    use crate::types::FieldType;

    fn derive(
        registry: &TypeRegistry,
        table: TableOptions,
        properties: Vec<PropertyDecl>,
    ) -> EntityDescriptor {
        let info = Arc::new(TypeInfo::from_definition(TypeDefinition {
            name: "Thing".into(),
            table: Some(table),
            properties,
        }));
        EntityDescriptor::derive(info, registry, &MapperConfig::default()).unwrap()
    }

    fn id(field_type: FieldType, generated: bool) -> PropertyDecl {
        PropertyDecl {
            id: true,
            generated,
            ..PropertyDecl::new("id", field_type)
        }
    }

    #[test]
    fn test_identity_with_ttl() {
        let registry = TypeRegistry::new();
        let entity = derive(
            &registry,
            TableOptions::named("things").with_ttl(Ttl::days(10)),
            vec![id(FieldType::Long, true)],
        );
        assert_eq!(
            create_table_ddl(&entity),
            "CREATE TABLE IF NOT EXISTS things (id LONG GENERATED ALWAYS AS IDENTITY (NO CYCLE), \
             kv_json_ JSON, PRIMARY KEY(SHARD(id))) USING TTL 10 DAYS"
        );
        assert_eq!(drop_table_ddl(&entity), "DROP TABLE IF EXISTS things");
    }

    #[test]
    fn test_uuid_id() {
        let registry = TypeRegistry::new();
        let entity = derive(&registry, TableOptions::default(), vec![id(FieldType::String, true)]);
        assert_eq!(
            create_table_ddl(&entity),
            "CREATE TABLE IF NOT EXISTS Thing (id STRING AS UUID GENERATED BY DEFAULT, \
             kv_json_ JSON, PRIMARY KEY(SHARD(id)))"
        );
    }

    #[test]
    fn test_composite_key_order() {
        let registry = TypeRegistry::new();
        let component = |name: &str, field_type, shard_key, order| PropertyDecl {
            key: Some(KeyAnnotation { shard_key, order }),
            ..PropertyDecl::new(name, field_type)
        };
        registry
            .register(TypeInfo::from_definition(TypeDefinition {
                name: "ThingKey".into(),
                table: None,
                properties: vec![
                    component("created", FieldType::Timestamp, false, Some(3)),
                    component("tenant", FieldType::String, true, Some(2)),
                    component("area", FieldType::Int, true, Some(1)),
                ],
            }))
            .unwrap();
        let entity = derive(
            &registry,
            TableOptions::named("things"),
            vec![id(FieldType::object("ThingKey"), false)],
        );
        assert_eq!(
            create_table_ddl(&entity),
            "CREATE TABLE IF NOT EXISTS things (area INTEGER, tenant STRING, created TIMESTAMP(9), \
             kv_json_ JSON, PRIMARY KEY(SHARD(area, tenant), created))"
        );
    }
}
