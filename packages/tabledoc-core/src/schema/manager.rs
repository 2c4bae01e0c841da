//! Table creation and removal against the store.

use std::sync::Arc;

use crate::cache::PreparedQueryCache;
use crate::error::DbError;
use crate::mapping::EntityDescriptor;
use crate::store::{StoreClient, TableRequest};

use super::ddl::{create_table_ddl, drop_table_ddl};
use super::validation::ensure_matches;

/// Creates and drops entity tables.
///
/// Every DDL statement it issues clears the prepared query cache, since
/// compiled handles may refer to the previous table layout.
pub struct SchemaManager {
    store: Arc<dyn StoreClient>,
    cache: Arc<PreparedQueryCache>,
}

impl SchemaManager {
    pub fn new(store: Arc<dyn StoreClient>, cache: Arc<PreparedQueryCache>) -> Self {
        Self { store, cache }
    }

    /// Creates the table of `entity` unless it exists.
    ///
    /// # Returns
    /// `true` if the table was created, `false` if an existing table matches
    /// the entity, or `DbError::SchemaMismatch` listing every discrepancy of
    /// an existing table.
    pub fn create_table_if_absent(&self, entity: &EntityDescriptor) -> Result<bool, DbError> {
        if let Some(existing) = self.store.get_table(entity.table_name())? {
            ensure_matches(entity, &existing)?;
            tracing::debug!(
                "Table '{}' exists and matches entity '{}'",
                entity.table_name(),
                entity.type_name()
            );
            return Ok(false);
        }

        let statement = create_table_ddl(entity);
        tracing::debug!("Issuing DDL: {}", statement);
        self.store.table_ddl(&TableRequest {
            statement,
            limits: Some(entity.capacity()),
            timeout: entity.timeout(),
        })?;
        self.cache.clear();
        tracing::info!(
            "Created table '{}' for entity '{}'",
            entity.table_name(),
            entity.type_name()
        );
        Ok(true)
    }

    /// Drops the table of `entity` if it exists.
    pub fn drop_table_if_exists(&self, entity: &EntityDescriptor) -> Result<(), DbError> {
        let statement = drop_table_ddl(entity);
        tracing::debug!("Issuing DDL: {}", statement);
        self.store.table_ddl(&TableRequest {
            statement,
            limits: None,
            timeout: entity.timeout(),
        })?;
        self.cache.clear();
        tracing::info!("Dropped table '{}'", entity.table_name());
        Ok(())
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
