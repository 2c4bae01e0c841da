//! Entity-level operations over a store.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::PreparedQueryCache;
use crate::convert::{key_value, Row, RowConverter};
use crate::dispatch::{
    Execution, Page, QueryDispatcher, QuerySource, RequestOptions, ResultShape, Slice,
};
use crate::error::DbError;
use crate::mapping::{EntityDescriptor, MappingContext};
use crate::query::{CompiledQuery, LiteralQuery, MethodQuery, Pageable, QueryDescriptor, QueryMode};
use crate::schema::SchemaManager;
use crate::store::{DeleteRequest, GetRequest, MultiDeleteRequest, PutRequest, StoreClient};
use crate::types::{BoxedObject, DomainObject, ObjectValue};

/// Persists, loads and queries registered entity types.
///
/// Tables of entities with `auto_create` are created on their first use
/// through the template.
pub struct TableTemplate {
    context: Arc<MappingContext>,
    store: Arc<dyn StoreClient>,
    cache: Arc<PreparedQueryCache>,
    schema: SchemaManager,
    /// Tables already checked by auto-create
    ensured: RwLock<HashSet<String>>,
}

impl TableTemplate {
    /// Creates a template with a prepared query cache sized from the
    /// context's configuration.
    pub fn new(store: Arc<dyn StoreClient>, context: Arc<MappingContext>) -> Self {
        let cache = Arc::new(PreparedQueryCache::from_config(context.config()));
        let schema = SchemaManager::new(Arc::clone(&store), Arc::clone(&cache));
        Self {
            context,
            store,
            cache,
            schema,
            ensured: RwLock::new(HashSet::new()),
        }
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    pub fn cache(&self) -> &PreparedQueryCache {
        &self.cache
    }

    pub fn converter(&self) -> RowConverter<'_> {
        RowConverter::new(&self.context)
    }

    /// Creates the table of `T` if it does not exist.
    ///
    /// # Returns
    /// `true` if the table was created; `DbError::SchemaMismatch` if an
    /// existing table does not match.
    pub fn create_table_if_absent<T: DomainObject>(&self) -> Result<bool, DbError> {
        let entity = self.context.entity::<T>()?;
        let created = self.schema.create_table_if_absent(&entity)?;
        self.ensured.write().insert(entity.table_name().to_string());
        Ok(created)
    }

    /// Drops the table of `T` if it exists.
    pub fn drop_table_if_exists<T: DomainObject>(&self) -> Result<(), DbError> {
        let entity = self.context.entity::<T>()?;
        self.schema.drop_table_if_exists(&entity)?;
        self.ensured.write().remove(entity.table_name());
        Ok(())
    }

    /// Writes a new entity.
    ///
    /// A null id of an entity with a generated id is left to the store; the
    /// generated value is written back into the returned object.
    pub fn insert<T: DomainObject>(&self, object: T) -> Result<T, DbError> {
        let entity = self.entity::<T>()?;
        let generate = entity.generation().is_some() && entity.id().get(&object)?.is_null();
        let row = self.converter().to_row(&object, generate)?;

        let generated_column = entity
            .key_columns()
            .first()
            .filter(|_| generate)
            .map(|column| column.name.clone());
        let result = self.store.put(&PutRequest {
            table: entity.table_name().to_string(),
            row,
            if_present_only: false,
            generated_column,
            ttl: entity.ttl(),
            durability: entity.durability(),
            timeout: entity.timeout(),
        })?;

        let mut object = object;
        if generate {
            let missing = || DbError::MissingId {
                entity: entity.type_name().to_string(),
            };
            let generated = result.generated.ok_or_else(missing)?;
            let column = entity.key_columns().first().ok_or_else(missing)?;
            let id = self
                .converter()
                .decode(&column.property.field_type, &generated)?;
            entity.id().set(&mut object, id)?;
            tracing::debug!(
                "Store generated id {} for '{}'",
                generated,
                entity.type_name()
            );
        }
        Ok(object)
    }

    /// Overwrites an existing entity.
    ///
    /// # Returns
    /// `DbError::RowNotPresent` if no row has the entity's id.
    pub fn update<T: DomainObject>(&self, object: &T) -> Result<(), DbError> {
        let entity = self.entity::<T>()?;
        let row = self.converter().to_row(object, false)?;
        let result = self.store.put(&PutRequest {
            table: entity.table_name().to_string(),
            row,
            if_present_only: true,
            generated_column: None,
            ttl: entity.ttl(),
            durability: entity.durability(),
            timeout: entity.timeout(),
        })?;
        if !result.success {
            return Err(DbError::RowNotPresent {
                table: entity.table_name().to_string(),
            });
        }
        Ok(())
    }

    pub fn find_by_id<T: DomainObject>(
        &self,
        id: impl Into<ObjectValue>,
    ) -> Result<Option<T>, DbError> {
        let entity = self.entity::<T>()?;
        let converter = self.converter();
        let key = converter.id_to_key(&entity, &id.into())?;
        let row = self.store.get(&GetRequest {
            table: entity.table_name().to_string(),
            key,
            consistency: entity.consistency(),
            timeout: entity.timeout(),
        })?;
        row.map(|row| converter.read::<T>(&row)).transpose()
    }

    pub fn find_all<T: DomainObject>(&self) -> Result<Vec<T>, DbError> {
        let execution =
            self.execute_descriptor::<T>(QueryDescriptor::select_all(), ResultShape::Collection)?;
        Ok(execution.into_objects().unwrap_or_default())
    }

    /// Deletes one entity by id; returns `true` if it existed.
    pub fn delete_by_id<T: DomainObject>(&self, id: impl Into<ObjectValue>) -> Result<bool, DbError> {
        let entity = self.entity::<T>()?;
        let key = self.converter().id_to_key(&entity, &id.into())?;
        let deleted = self.store.delete(&DeleteRequest {
            table: entity.table_name().to_string(),
            key,
            durability: entity.durability(),
            timeout: entity.timeout(),
        })?;
        Ok(deleted)
    }

    /// Deletes every row of the table of `T` with one statement.
    ///
    /// # Returns
    /// The number of rows the store reports as deleted.
    pub fn delete_all<T: DomainObject>(&self) -> Result<u64, DbError> {
        let entity = self.entity::<T>()?;
        let query = CompiledQuery {
            text: format!("DELETE FROM {}", entity.table_name()),
            parameters: Default::default(),
        };
        let rows = self
            .dispatcher()
            .rows(&query, RequestOptions::for_entity(&entity))?;
        let deleted = rows
            .iter()
            .filter_map(|row| row.iter().next().and_then(|(_, v)| v.as_i64()))
            .map(|n| u64::try_from(n).unwrap_or(0))
            .sum();
        tracing::debug!("Deleted {} row(s) from '{}'", deleted, entity.table_name());
        Ok(deleted)
    }

    /// Deletes every row sharing a complete shard key.
    ///
    /// # Arguments
    /// * `shard_key` - One `(column, value)` pair per shard key column
    pub fn delete_in_shard<T: DomainObject>(
        &self,
        shard_key: &[(&str, ObjectValue)],
    ) -> Result<u64, DbError> {
        let entity = self.entity::<T>()?;
        let mut key = Row::new();
        for column in entity.shard_keys() {
            let value = shard_key
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&column.name))
                .map(|(_, value)| value)
                .filter(|value| !value.is_null())
                .ok_or_else(|| {
                    DbError::invalid_query(format!(
                        "shard key column '{}' of '{}' has no value",
                        column.name,
                        entity.type_name()
                    ))
                })?;
            key.insert(column.name.clone(), key_value(&column.property.field_type, value)?);
        }
        if key.len() != shard_key.len() {
            return Err(DbError::invalid_query(format!(
                "'{}' has {} shard key column(s), got {} value(s)",
                entity.type_name(),
                key.len(),
                shard_key.len()
            )));
        }

        let deleted = self.store.multi_delete(&MultiDeleteRequest {
            table: entity.table_name().to_string(),
            shard_key: key,
            durability: entity.durability(),
            timeout: entity.timeout(),
        })?;
        Ok(deleted)
    }

    /// Runs literal query text with named arguments and returns raw rows.
    pub fn query_rows(
        &self,
        text: &str,
        arguments: Vec<(Option<String>, ObjectValue)>,
    ) -> Result<Vec<Row>, DbError> {
        let query = LiteralQuery::compile(&self.context, text, arguments)?;
        self.dispatcher()
            .rows(&query, RequestOptions::from_config(self.context.config()))
    }

    /// Runs a query derived from a method name, shaped by its prefix.
    ///
    /// # Arguments
    /// * `method` - e.g. `findByLastNameOrderByAgeDesc`, `countByActiveTrue`
    /// * `arguments` - Consumed positionally by the name's predicates
    pub fn execute<T: DomainObject>(
        &self,
        method: &str,
        arguments: Vec<ObjectValue>,
    ) -> Result<Execution<T>, DbError> {
        let entity = self.entity::<T>()?;
        let descriptor = self.derive(&entity, method, arguments)?;
        let shape = ResultShape::for_mode(descriptor.mode);
        self.run::<T>(&entity, QuerySource::Derived(descriptor), shape)
    }

    /// Like [`execute`](Self::execute), returning objects of projection
    /// type `P` built from the matching rows of `T`.
    pub fn execute_projected<T: DomainObject, P: DomainObject>(
        &self,
        method: &str,
        arguments: Vec<ObjectValue>,
    ) -> Result<Execution<P>, DbError> {
        let entity = self.entity::<T>()?;
        let mut descriptor = self.derive(&entity, method, arguments)?;
        if descriptor.mode == QueryMode::Delete {
            return Err(DbError::invalid_query("delete queries cannot be projected"));
        }
        let projection = self.context.registry().info_of::<P>()?;
        descriptor.projection = Some(projection.name().to_string());
        let shape = ResultShape::for_mode(descriptor.mode);
        self.run::<P>(&entity, QuerySource::Derived(descriptor), shape)
    }

    /// Runs a method-name query and returns one page plus the total count.
    pub fn execute_paged<T: DomainObject>(
        &self,
        method: &str,
        arguments: Vec<ObjectValue>,
        pageable: Pageable,
    ) -> Result<Page<T>, DbError> {
        let entity = self.entity::<T>()?;
        let descriptor = self.derive(&entity, method, arguments)?;
        match self.run::<T>(&entity, QuerySource::Derived(descriptor), ResultShape::Page(pageable))? {
            Execution::Page(page) => Ok(page),
            _ => Err(DbError::mapping("paged query did not return a page")),
        }
    }

    /// Runs a method-name query and returns one slice.
    pub fn execute_sliced<T: DomainObject>(
        &self,
        method: &str,
        arguments: Vec<ObjectValue>,
        pageable: Pageable,
    ) -> Result<Slice<T>, DbError> {
        let entity = self.entity::<T>()?;
        let descriptor = self.derive(&entity, method, arguments)?;
        match self.run::<T>(&entity, QuerySource::Derived(descriptor), ResultShape::Slice(pageable))? {
            Execution::Slice(slice) => Ok(slice),
            _ => Err(DbError::mapping("sliced query did not return a slice")),
        }
    }

    /// Runs literal query text over the table of `T`.
    pub fn execute_literal<T: DomainObject>(
        &self,
        text: &str,
        arguments: Vec<(Option<String>, ObjectValue)>,
        shape: ResultShape,
    ) -> Result<Execution<T>, DbError> {
        let entity = self.entity::<T>()?;
        let query = LiteralQuery::compile(&self.context, text, arguments)?;
        self.run::<T>(&entity, QuerySource::Literal(query), shape)
    }

    /// Runs a descriptor built by the caller.
    pub fn execute_descriptor<T: DomainObject>(
        &self,
        descriptor: QueryDescriptor,
        shape: ResultShape,
    ) -> Result<Execution<T>, DbError> {
        let entity = self.entity::<T>()?;
        self.run::<T>(&entity, QuerySource::Derived(descriptor), shape)
    }

    fn run<R: DomainObject>(
        &self,
        entity: &EntityDescriptor,
        source: QuerySource,
        shape: ResultShape,
    ) -> Result<Execution<R>, DbError> {
        self.dispatcher()
            .dispatch(entity, &source, shape)?
            .try_map(|object| BoxedObject::from_box(object).downcast::<R>())
    }

    fn derive(
        &self,
        entity: &EntityDescriptor,
        method: &str,
        arguments: Vec<ObjectValue>,
    ) -> Result<QueryDescriptor, DbError> {
        let registry = self.context.registry();
        let mut query = MethodQuery::parse(method)?;
        query.restrict_ignore_case(entity, registry);
        query.to_descriptor(entity, registry, arguments)
    }

    fn dispatcher(&self) -> QueryDispatcher<'_> {
        QueryDispatcher::new(&self.context, self.store.as_ref(), &self.cache)
    }

    /// Returns the descriptor of `T`, creating its table on first use when
    /// the entity asks for it.
    fn entity<T: DomainObject>(&self) -> Result<Arc<EntityDescriptor>, DbError> {
        let entity = self.context.entity::<T>()?;
        if entity.auto_create() && !self.ensured.read().contains(entity.table_name()) {
            self.schema.create_table_if_absent(&entity)?;
            self.ensured.write().insert(entity.table_name().to_string());
        }
        Ok(entity)
    }
}

impl std::fmt::Debug for TableTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableTemplate")
            .field("context", &self.context)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
