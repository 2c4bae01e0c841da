//! Query execution in the result shape a caller asks for.
//!
//! Every shape runs the same pipeline: compile once, fetch the prepared
//! handle from the cache, bind, stream rows across continuation batches and
//! convert each row. Only the terminal consumption differs.
//!
//! `Page` results count matching rows with a second, independent query. The
//! two queries are not isolated from each other, so the total may reflect a
//! different point in time than the page content.

use std::time::Duration;

use crate::cache::PreparedQueryCache;
use crate::config::MapperConfig;
use crate::convert::{Row, RowConverter};
use crate::error::DbError;
use crate::mapping::{Consistency, Durability, EntityDescriptor, MappingContext};
use crate::query::{
    CompiledQuery, Pageable, QueryCompiler, QueryDescriptor, QueryMode, LIMIT_PARAMETER,
};
use crate::store::{DeleteRequest, QueryRequest, StoreClient, StoreErrorCode};
use crate::types::{DomainObject, FieldValue};

/// How query results are consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// Every matching row
    Collection,
    /// One page plus the total number of matching rows
    Page(Pageable),
    /// One page plus whether another follows
    Slice(Pageable),
    Exists,
    Count,
    /// Deletes every matching row, one by one
    Delete,
}

impl ResultShape {
    /// Default shape for a query mode.
    pub fn for_mode(mode: QueryMode) -> Self {
        match mode {
            QueryMode::Select => ResultShape::Collection,
            QueryMode::Count => ResultShape::Count,
            QueryMode::Exists => ResultShape::Exists,
            QueryMode::Delete => ResultShape::Delete,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    /// Matching rows across all pages
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.pageable.size == 0 {
            return 1;
        }
        self.total_elements.div_ceil(self.pageable.size)
    }

    pub fn has_next(&self) -> bool {
        self.pageable.page + 1 < self.total_pages()
    }
}

/// A page of results without a total.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub has_next: bool,
}

/// Result of a dispatched query.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution<T> {
    Collection(Vec<T>),
    Page(Page<T>),
    Slice(Slice<T>),
    Exists(bool),
    Count(u64),
    /// The rows that were deleted
    Deleted(Vec<T>),
}

impl<T> Execution<T> {
    /// Converts every contained object.
    pub fn try_map<U, F>(self, mut convert: F) -> Result<Execution<U>, DbError>
    where
        F: FnMut(T) -> Result<U, DbError>,
    {
        let mut all = |items: Vec<T>| items.into_iter().map(&mut convert).collect::<Result<Vec<U>, _>>();
        Ok(match self {
            Execution::Collection(items) => Execution::Collection(all(items)?),
            Execution::Page(page) => Execution::Page(Page {
                content: all(page.content)?,
                pageable: page.pageable,
                total_elements: page.total_elements,
            }),
            Execution::Slice(slice) => Execution::Slice(Slice {
                content: all(slice.content)?,
                pageable: slice.pageable,
                has_next: slice.has_next,
            }),
            Execution::Exists(found) => Execution::Exists(found),
            Execution::Count(count) => Execution::Count(count),
            Execution::Deleted(items) => Execution::Deleted(all(items)?),
        })
    }

    /// Returns the objects of a collection, page, slice or delete result.
    pub fn into_objects(self) -> Option<Vec<T>> {
        match self {
            Execution::Collection(items) | Execution::Deleted(items) => Some(items),
            Execution::Page(page) => Some(page.content),
            Execution::Slice(slice) => Some(slice.content),
            Execution::Exists(_) | Execution::Count(_) => None,
        }
    }
}

/// Where a query comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    /// A descriptor compiled per shape
    Derived(QueryDescriptor),
    /// Literal text with its arguments already bound
    Literal(CompiledQuery),
}

/// Per-request store options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub consistency: Consistency,
    pub durability: Durability,
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn for_entity(entity: &EntityDescriptor) -> Self {
        Self {
            consistency: entity.consistency(),
            durability: entity.durability(),
            timeout: entity.timeout(),
        }
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        Self {
            consistency: config.consistency,
            durability: config.durability,
            timeout: config.request_timeout(),
        }
    }
}

/// Runs queries against the store.
pub struct QueryDispatcher<'a> {
    context: &'a MappingContext,
    store: &'a dyn StoreClient,
    cache: &'a PreparedQueryCache,
}

impl<'a> QueryDispatcher<'a> {
    pub fn new(
        context: &'a MappingContext,
        store: &'a dyn StoreClient,
        cache: &'a PreparedQueryCache,
    ) -> Self {
        Self {
            context,
            store,
            cache,
        }
    }

    /// Runs a query over the table of `entity`.
    ///
    /// # Arguments
    /// * `entity` - Entity whose rows the query returns
    /// * `source` - Descriptor or bound literal query
    /// * `shape` - How results are consumed
    ///
    /// # Returns
    /// The result in the requested shape. Paged shapes need a derived
    /// query.
    pub fn dispatch(
        &self,
        entity: &EntityDescriptor,
        source: &QuerySource,
        shape: ResultShape,
    ) -> Result<Execution<Box<dyn DomainObject>>, DbError> {
        let options = RequestOptions::for_entity(entity);
        match shape {
            ResultShape::Collection => {
                let query = self.compile(entity, source, None)?;
                let objects = self.objects(entity, source, &query, options)?;
                Ok(Execution::Collection(objects))
            }
            ResultShape::Exists => {
                let query = self.compile(entity, source, Some(QueryMode::Exists))?;
                let mut found = false;
                self.for_each_row(&query, options, |_| {
                    found = true;
                    Ok(false)
                })?;
                Ok(Execution::Exists(found))
            }
            ResultShape::Count => {
                let query = self.compile(entity, source, Some(QueryMode::Count))?;
                let count = single_count(self.rows(&query, options)?)?;
                Ok(Execution::Count(count))
            }
            ResultShape::Page(pageable) => {
                let descriptor = paged(source, &pageable)?;
                let compiler = QueryCompiler::new(self.context);
                let query = compiler.compile(entity, &descriptor)?;
                let content = self.objects(entity, source, &query, options)?;

                let count = compiler.compile(entity, &descriptor.to_count())?;
                let total_elements = single_count(self.rows(&count, options)?)?;
                Ok(Execution::Page(Page {
                    content,
                    pageable,
                    total_elements,
                }))
            }
            ResultShape::Slice(pageable) => {
                let descriptor = paged(source, &pageable)?;
                let mut query = QueryCompiler::new(self.context).compile(entity, &descriptor)?;
                let lookahead = i64::try_from(pageable.size.saturating_add(1)).unwrap_or(i64::MAX);
                query
                    .parameters
                    .insert(LIMIT_PARAMETER.to_string(), FieldValue::Long(lookahead));

                let mut content = self.objects(entity, source, &query, options)?;
                let size = usize::try_from(pageable.size).unwrap_or(usize::MAX);
                let has_next = content.len() > size;
                content.truncate(size);
                Ok(Execution::Slice(Slice {
                    content,
                    pageable,
                    has_next,
                }))
            }
            ResultShape::Delete => {
                let query = self.compile(entity, source, Some(QueryMode::Delete))?;
                let objects = self.objects(entity, source, &query, options)?;
                let converter = RowConverter::new(self.context);
                for object in &objects {
                    let id = entity.id().get(object.as_ref())?;
                    let key = converter.id_to_key(entity, &id)?;
                    self.store.delete(&DeleteRequest {
                        table: entity.table_name().to_string(),
                        key,
                        durability: options.durability,
                        timeout: options.timeout,
                    })?;
                }
                tracing::debug!(
                    "Deleted {} row(s) from '{}'",
                    objects.len(),
                    entity.table_name()
                );
                Ok(Execution::Deleted(objects))
            }
        }
    }

    /// Runs a compiled query and collects its rows.
    pub fn rows(&self, query: &CompiledQuery, options: RequestOptions) -> Result<Vec<Row>, DbError> {
        let mut rows = Vec::new();
        self.for_each_row(query, options, |row| {
            rows.push(row);
            Ok(true)
        })?;
        Ok(rows)
    }

    /// Streams the rows of a compiled query into `visit` until it returns
    /// `false` or the rows run out.
    ///
    /// A stale prepared handle is evicted and the query re-prepared once,
    /// provided no row has been delivered yet.
    pub fn for_each_row<F>(
        &self,
        query: &CompiledQuery,
        options: RequestOptions,
        mut visit: F,
    ) -> Result<(), DbError>
    where
        F: FnMut(Row) -> Result<bool, DbError>,
    {
        let mut retried = false;
        loop {
            let mut delivered = false;
            match self.run_batches(query, options, &mut visit, &mut delivered) {
                Err(e) if !retried && !delivered && is_stale_handle(&e) => {
                    tracing::debug!("Prepared handle is stale, re-preparing: {}", query.text);
                    self.cache.invalidate(&query.text);
                    retried = true;
                }
                result => return result,
            }
        }
    }

    fn run_batches<F>(
        &self,
        query: &CompiledQuery,
        options: RequestOptions,
        visit: &mut F,
        delivered: &mut bool,
    ) -> Result<(), DbError>
    where
        F: FnMut(Row) -> Result<bool, DbError>,
    {
        let mut statement = self.cache.get_or_prepare(&query.text, |text| {
            self.store.prepare(text).map_err(DbError::from)
        })?;
        for (name, value) in &query.parameters {
            statement.set_variable(name, value.clone());
        }

        let mut request = QueryRequest {
            statement,
            continuation: None,
            consistency: options.consistency,
            durability: options.durability,
            timeout: options.timeout,
        };
        loop {
            let batch = self.store.query(&request)?;
            for row in batch.rows {
                *delivered = true;
                if !visit(row)? {
                    return Ok(());
                }
            }
            match batch.continuation {
                Some(continuation) => request.continuation = Some(continuation),
                None => return Ok(()),
            }
        }
    }

    fn compile(
        &self,
        entity: &EntityDescriptor,
        source: &QuerySource,
        mode: Option<QueryMode>,
    ) -> Result<CompiledQuery, DbError> {
        match source {
            QuerySource::Derived(descriptor) => {
                let compiler = QueryCompiler::new(self.context);
                match mode {
                    Some(mode) if mode != descriptor.mode => {
                        compiler.compile(entity, &descriptor.clone().with_mode(mode))
                    }
                    _ => compiler.compile(entity, descriptor),
                }
            }
            QuerySource::Literal(query) => Ok(query.clone()),
        }
    }

    /// Runs `query` and converts each row into an entity or projection.
    fn objects(
        &self,
        entity: &EntityDescriptor,
        source: &QuerySource,
        query: &CompiledQuery,
        options: RequestOptions,
    ) -> Result<Vec<Box<dyn DomainObject>>, DbError> {
        let converter = RowConverter::new(self.context);
        let projection = match source {
            QuerySource::Derived(descriptor) => descriptor
                .projection
                .as_deref()
                .filter(|name| *name != entity.type_name())
                .map(|name| {
                    self.context
                        .registry()
                        .get(name)
                        .ok_or_else(|| DbError::UnregisteredType(name.to_string()))
                })
                .transpose()?,
            QuerySource::Literal(_) => None,
        };

        let mut objects = Vec::new();
        self.for_each_row(query, options, |row| {
            let object = match &projection {
                Some(info) => converter.projection_from_row(entity, info, &row)?,
                None => converter.entity_from_row(entity, &row)?,
            };
            objects.push(object);
            Ok(true)
        })?;
        Ok(objects)
    }
}

fn paged(source: &QuerySource, pageable: &Pageable) -> Result<QueryDescriptor, DbError> {
    let QuerySource::Derived(descriptor) = source else {
        return Err(DbError::invalid_query(
            "paged results need a derived query, not literal text",
        ));
    };
    if pageable.size == 0 {
        return Err(DbError::invalid_query("page size must be positive"));
    }
    Ok(descriptor
        .clone()
        .with_mode(QueryMode::Select)
        .with_pageable(pageable.clone()))
}

/// Extracts the value of a count query: exactly one row holding one
/// integral value.
fn single_count(rows: Vec<Row>) -> Result<u64, DbError> {
    let [row] = rows.as_slice() else {
        return Err(DbError::mapping(format!(
            "count query returned {} rows, expected 1",
            rows.len()
        )));
    };
    let mut values = row.iter().map(|(_, value)| value);
    match (values.next(), values.next()) {
        (Some(value), None) => value
            .as_i64()
            .and_then(|count| u64::try_from(count).ok())
            .ok_or_else(|| DbError::mapping(format!("count query returned non-integral {}", value))),
        _ => Err(DbError::mapping(format!(
            "count query returned {} columns, expected 1",
            row.len()
        ))),
    }
}

fn is_stale_handle(error: &DbError) -> bool {
    error
        .store_error()
        .is_some_and(|e| e.code == StoreErrorCode::PreparedStatementInvalid)
}
