use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::entity::{EntityDescriptor, ResolvedPath};
use super::registry::TypeRegistry;
use super::type_info::TypeInfo;
use crate::config::MapperConfig;
use crate::error::DbError;
use crate::types::DomainObject;

/// Registry, configuration and memoized entity descriptors.
///
/// Descriptors are derived on first use and live as long as the context.
#[derive(Debug)]
pub struct MappingContext {
    registry: Arc<TypeRegistry>,
    config: MapperConfig,
    entities: RwLock<HashMap<String, Arc<EntityDescriptor>>>,
}

impl MappingContext {
    pub fn new(registry: Arc<TypeRegistry>, config: MapperConfig) -> Self {
        Self {
            registry,
            config,
            entities: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Returns the descriptor of the entity registered for `T`.
    pub fn entity<T: DomainObject>(&self) -> Result<Arc<EntityDescriptor>, DbError> {
        let info = self.registry.info_of::<T>()?;
        self.entity_for(&info)
    }

    /// Returns the descriptor of the entity registered under `name`.
    pub fn entity_by_name(&self, name: &str) -> Result<Arc<EntityDescriptor>, DbError> {
        let info = self
            .registry
            .get(name)
            .ok_or_else(|| DbError::UnregisteredType(name.to_string()))?;
        self.entity_for(&info)
    }

    /// Returns the memoized descriptor of `info`, deriving it on first use.
    pub fn entity_for(&self, info: &Arc<TypeInfo>) -> Result<Arc<EntityDescriptor>, DbError> {
        if let Some(descriptor) = self.entities.read().get(info.name()) {
            return Ok(Arc::clone(descriptor));
        }

        let derived = Arc::new(EntityDescriptor::derive(
            Arc::clone(info),
            &self.registry,
            &self.config,
        )?);
        let mut entities = self.entities.write();
        let descriptor = entities
            .entry(info.name().to_string())
            .or_insert(derived);
        Ok(Arc::clone(descriptor))
    }

    /// Resolves a property path of an entity.
    pub fn resolve_path<'a>(
        &self,
        entity: &'a EntityDescriptor,
        path: &str,
    ) -> Result<ResolvedPath<'a>, DbError> {
        entity.resolve_path(path, &self.registry)
    }

    /// Number of memoized descriptors.
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }
}
