use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::type_info::TypeInfo;
use crate::error::DbError;
use crate::types::DomainObject;

#[derive(Debug, Default)]
struct Entries {
    by_name: HashMap<String, Arc<TypeInfo>>,
    by_type_id: HashMap<TypeId, String>,
}

/// Registry of property tables.
///
/// Stores registered types with lookup by name and by Rust type.
/// Provides thread-safe registration and retrieval.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: RwLock<Entries>,
}

impl TypeRegistry {
    /// Creates a new empty type registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a property table.
    ///
    /// # Arguments
    /// * `info` - Property table to register
    ///
    /// # Returns
    /// The shared table, or `Err(DbError::TypeAlreadyRegistered)` if the name
    /// or the Rust type is already taken.
    pub fn register(&self, info: TypeInfo) -> Result<Arc<TypeInfo>, DbError> {
        let mut entries = self.entries.write();

        if entries.by_name.contains_key(info.name()) {
            return Err(DbError::TypeAlreadyRegistered(info.name().to_string()));
        }
        if let Some(type_id) = info.type_id() {
            if let Some(existing) = entries.by_type_id.get(&type_id) {
                return Err(DbError::TypeAlreadyRegistered(existing.clone()));
            }
            entries.by_type_id.insert(type_id, info.name().to_string());
        }

        tracing::debug!("Registered type '{}'", info.name());
        let info = Arc::new(info);
        entries
            .by_name
            .insert(info.name().to_string(), Arc::clone(&info));
        Ok(info)
    }

    /// Retrieves a property table by registered name.
    pub fn get(&self, name: &str) -> Option<Arc<TypeInfo>> {
        self.entries.read().by_name.get(name).cloned()
    }

    /// Retrieves the property table of a Rust type.
    pub fn get_by_type_id(&self, type_id: TypeId) -> Option<Arc<TypeInfo>> {
        let entries = self.entries.read();
        let name = entries.by_type_id.get(&type_id)?;
        entries.by_name.get(name).cloned()
    }

    /// Retrieves the property table of `T`, failing if it was never registered.
    pub fn info_of<T: DomainObject>(&self) -> Result<Arc<TypeInfo>, DbError> {
        self.get_by_type_id(TypeId::of::<T>())
            .ok_or_else(|| DbError::UnregisteredType(std::any::type_name::<T>().to_string()))
    }

    /// Retrieves the property table of the object's runtime type.
    pub fn info_of_object(&self, object: &dyn DomainObject) -> Result<Arc<TypeInfo>, DbError> {
        self.get_by_type_id(object.object_type_id())
            .ok_or_else(|| DbError::UnregisteredType(format!("{:?}", object.object_type_id())))
    }

    /// Checks if a type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().by_name.contains_key(name)
    }

    /// Returns all registered type names.
    pub fn type_names(&self) -> Vec<String> {
        self.entries.read().by_name.keys().cloned().collect()
    }

    /// Removes a type registration.
    ///
    /// # Returns
    /// `true` if the type was removed, `false` if it wasn't found.
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.by_name.remove(name) {
            Some(info) => {
                if let Some(type_id) = info.type_id() {
                    entries.by_type_id.remove(&type_id);
                }
                true
            }
            None => false,
        }
    }
}
