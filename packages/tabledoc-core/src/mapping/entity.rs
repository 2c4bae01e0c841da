//! Entity descriptors: the table layout derived from a property table.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::options::{CapacityMode, Consistency, Durability, Ttl};
use super::property::PropertyDescriptor;
use super::registry::TypeRegistry;
use super::type_info::{KeyAnnotation, TypeInfo};
use crate::config::MapperConfig;
use crate::error::DbError;
use crate::types::FieldType;

/// Reserved name of the document column.
pub const DOCUMENT_COLUMN: &str = "kv_json_";

/// How the store generates id values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGeneration {
    /// Identity sequence, for integral ids
    Identity,
    /// Random UUID, for string ids
    Uuid,
}

/// One primary key column.
#[derive(Debug, Clone)]
pub struct KeyColumn {
    pub name: String,
    pub sql_type: &'static str,
    pub shard_key: bool,
    pub order: Option<i32>,
    /// The id property for simple keys, the key type's property for
    /// composite keys
    pub property: PropertyDescriptor,
}

/// Where a property path lives in the row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPath<'a> {
    /// A primary key column
    Key { column: &'a str, field_type: &'a FieldType },
    /// A path inside the document column, with the declared type of its
    /// last segment
    Document { path: String, field_type: FieldType },
}

impl ResolvedPath<'_> {
    pub fn field_type(&self) -> &FieldType {
        match self {
            ResolvedPath::Key { field_type, .. } => field_type,
            ResolvedPath::Document { field_type, .. } => field_type,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, ResolvedPath::Key { .. })
    }
}

/// Table layout and options of one entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    info: Arc<TypeInfo>,
    table_name: String,
    id: PropertyDescriptor,
    key_type: Option<Arc<TypeInfo>>,
    key_columns: Vec<KeyColumn>,
    generation: Option<IdGeneration>,
    properties: Vec<PropertyDescriptor>,
    ttl: Option<Ttl>,
    capacity: CapacityMode,
    consistency: Consistency,
    durability: Durability,
    timeout: Duration,
    auto_create: bool,
}

impl EntityDescriptor {
    /// Derives the descriptor of an entity type.
    ///
    /// # Arguments
    /// * `info` - Property table of the entity
    /// * `registry` - Registry holding the composite key type, if any
    /// * `config` - Defaults for options the entity leaves unset
    ///
    /// # Returns
    /// The descriptor, or a configuration error if the key layout is invalid.
    pub fn derive(
        info: Arc<TypeInfo>,
        registry: &TypeRegistry,
        config: &MapperConfig,
    ) -> Result<Self, DbError> {
        let entity = info.name().to_string();
        let options = info
            .table()
            .cloned()
            .ok_or_else(|| DbError::UnsupportedType {
                type_name: entity.clone(),
                reason: "not declared as an entity".to_string(),
            })?;

        let mut ids = info.properties().iter().filter(|p| p.is_id());
        let id_info = ids.next().ok_or_else(|| DbError::MissingId {
            entity: entity.clone(),
        })?;
        if ids.next().is_some() {
            return Err(DbError::mapping(format!(
                "entity '{}' declares more than one id property",
                entity
            )));
        }
        let id = PropertyDescriptor::new(id_info);

        let (key_type, key_columns, generation) = match &id.field_type {
            FieldType::Object(key_name) => {
                if id_info.is_generated() {
                    return Err(DbError::InvalidCompositeKey {
                        entity,
                        reason: "composite keys cannot be generated".to_string(),
                    });
                }
                let key_info = registry
                    .get(key_name)
                    .ok_or_else(|| DbError::UnregisteredType(key_name.clone()))?;
                let columns = composite_key_columns(&entity, &key_info)?;
                (Some(key_info), columns, None)
            }
            field_type => {
                let generation = if id_info.is_generated() {
                    Some(generation_for(&entity, field_type)?)
                } else {
                    None
                };
                let column = key_column(&entity, id.clone(), KeyAnnotation::default())?;
                (None, vec![column], generation)
            }
        };

        let properties = info
            .properties()
            .iter()
            .filter(|p| !p.is_id() && !p.is_transient())
            .map(PropertyDescriptor::new)
            .collect();

        tracing::debug!(
            "Derived entity '{}': table {}, {} key column(s)",
            entity,
            options.table_name.as_deref().unwrap_or(&entity),
            key_columns.len()
        );

        Ok(Self {
            table_name: options.table_name.clone().unwrap_or_else(|| entity.clone()),
            info,
            id,
            key_type,
            key_columns,
            generation,
            properties,
            ttl: options.ttl,
            capacity: options.capacity.unwrap_or(config.default_capacity),
            consistency: options.consistency.unwrap_or(config.consistency),
            durability: options.durability.unwrap_or(config.durability),
            timeout: Duration::from_millis(options.timeout_ms.unwrap_or(config.request_timeout_ms)),
            auto_create: options.auto_create.unwrap_or(config.auto_create_tables),
        })
    }

    pub fn type_name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id(&self) -> &PropertyDescriptor {
        &self.id
    }

    /// Property table of the composite key type.
    pub fn key_type(&self) -> Option<&Arc<TypeInfo>> {
        self.key_type.as_ref()
    }

    pub fn is_composite(&self) -> bool {
        self.key_type.is_some()
    }

    /// Primary key columns, shard keys first.
    pub fn key_columns(&self) -> &[KeyColumn] {
        &self.key_columns
    }

    pub fn shard_keys(&self) -> impl Iterator<Item = &KeyColumn> {
        self.key_columns.iter().filter(|c| c.shard_key)
    }

    pub fn non_shard_keys(&self) -> impl Iterator<Item = &KeyColumn> {
        self.key_columns.iter().filter(|c| !c.shard_key)
    }

    pub fn key_column(&self, name: &str) -> Option<&KeyColumn> {
        self.key_columns.iter().find(|c| c.name == name)
    }

    pub fn generation(&self) -> Option<IdGeneration> {
        self.generation
    }

    /// Persisted properties other than the id, in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn ttl(&self) -> Option<Ttl> {
        self.ttl
    }

    pub fn capacity(&self) -> CapacityMode {
        self.capacity
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    /// Resolves a dotted property path to a key column or a document path.
    ///
    /// The id resolves to its key column. Composite key components resolve
    /// as `<id>.<component>` or by bare component name. Segments below a
    /// property are resolved through the registry; maps accept any key
    /// segment and opaque types accept any remaining path.
    pub fn resolve_path(
        &self,
        path: &str,
        registry: &TypeRegistry,
    ) -> Result<ResolvedPath<'_>, DbError> {
        let unknown = || DbError::UnknownProperty {
            entity: self.type_name().to_string(),
            property: path.to_string(),
        };

        let mut segments = path.split('.');
        let head = segments.next().filter(|s| !s.is_empty()).ok_or_else(unknown)?;

        if head == self.id.name {
            let column = if self.is_composite() {
                let component = segments.next().ok_or_else(|| {
                    DbError::invalid_query(format!(
                        "composite id '{}' must be queried by component",
                        path
                    ))
                })?;
                self.key_column(component).ok_or_else(unknown)?
            } else {
                self.key_columns.first().ok_or_else(unknown)?
            };
            if segments.next().is_some() {
                return Err(unknown());
            }
            return Ok(ResolvedPath::Key {
                column: &column.name,
                field_type: &column.property.field_type,
            });
        }

        if let Some(property) = self.property(head) {
            let mut field_type = property.field_type.clone();
            for segment in segments {
                field_type = step_into(&field_type, segment, registry).ok_or_else(unknown)?;
            }
            return Ok(ResolvedPath::Document {
                path: path.to_string(),
                field_type,
            });
        }

        if self.is_composite() && segments.next().is_none() {
            if let Some(column) = self.key_column(head) {
                return Ok(ResolvedPath::Key {
                    column: &column.name,
                    field_type: &column.property.field_type,
                });
            }
        }

        Err(unknown())
    }
}

fn step_into(field_type: &FieldType, segment: &str, registry: &TypeRegistry) -> Option<FieldType> {
    match field_type {
        FieldType::Array(element) | FieldType::Collection(element) => {
            step_into(element, segment, registry)
        }
        FieldType::Map { value, .. } => Some((**value).clone()),
        FieldType::Object(name) => registry
            .get(name)?
            .property(segment)
            .map(|p| p.field_type().clone()),
        FieldType::Any | FieldType::Native => Some(FieldType::Any),
        _ => None,
    }
}

fn key_column(
    entity: &str,
    property: PropertyDescriptor,
    annotation: KeyAnnotation,
) -> Result<KeyColumn, DbError> {
    if property.name.eq_ignore_ascii_case(DOCUMENT_COLUMN) {
        return Err(DbError::ReservedColumnName {
            entity: entity.to_string(),
            column: property.name,
        });
    }
    let sql_type = property
        .field_type
        .key_sql_type()
        .ok_or_else(|| DbError::UnsupportedType {
            type_name: property.field_type.to_string(),
            reason: format!("property '{}' cannot be a primary key column", property.name),
        })?;
    Ok(KeyColumn {
        name: property.name.clone(),
        sql_type,
        shard_key: annotation.shard_key,
        order: annotation.order,
        property,
    })
}

fn composite_key_columns(entity: &str, key_info: &TypeInfo) -> Result<Vec<KeyColumn>, DbError> {
    let invalid = |reason: String| DbError::InvalidCompositeKey {
        entity: entity.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for property in key_info.properties().iter().filter(|p| !p.is_transient()) {
        if !seen.insert(property.name().to_lowercase()) {
            return Err(invalid(format!(
                "key component '{}' declared more than once",
                property.name()
            )));
        }
        let descriptor = PropertyDescriptor::new(property).as_key_component();
        columns.push(key_column(
            entity,
            descriptor,
            property.key().unwrap_or_default(),
        )?);
    }

    if columns.is_empty() {
        return Err(invalid(format!(
            "key type '{}' has no components",
            key_info.name()
        )));
    }
    if !columns.iter().any(|c| c.shard_key) {
        return Err(invalid("no key component is a shard key".to_string()));
    }

    let ordered = columns.iter().filter(|c| c.order.is_some()).count();
    if ordered == 0 {
        columns.sort_by(|a, b| {
            b.shard_key
                .cmp(&a.shard_key)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
    } else if ordered == columns.len() {
        let mut orders = HashSet::new();
        for order in columns.iter().filter_map(|c| c.order) {
            if !orders.insert(order) {
                return Err(invalid(format!("order {} used more than once", order)));
            }
        }
        let last_shard = columns.iter().filter(|c| c.shard_key).filter_map(|c| c.order).max();
        let first_non_shard = columns.iter().filter(|c| !c.shard_key).filter_map(|c| c.order).min();
        if let (Some(last_shard), Some(first_non_shard)) = (last_shard, first_non_shard) {
            if last_shard > first_non_shard {
                return Err(invalid(
                    "every shard key order must be lower than every non-shard key order"
                        .to_string(),
                ));
            }
        }
        columns.sort_by_key(|c| c.order);
    } else {
        return Err(invalid(
            "either all or none of the key components must declare an order".to_string(),
        ));
    }

    Ok(columns)
}

fn generation_for(entity: &str, field_type: &FieldType) -> Result<IdGeneration, DbError> {
    match field_type {
        FieldType::Int | FieldType::Long | FieldType::BigInteger => Ok(IdGeneration::Identity),
        FieldType::String => Ok(IdGeneration::Uuid),
        other => Err(DbError::UnsupportedType {
            type_name: other.to_string(),
            reason: format!("generated id of entity '{}' must be integral or string", entity),
        }),
    }
}
