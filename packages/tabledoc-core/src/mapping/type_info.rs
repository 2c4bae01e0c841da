//! Ahead-of-time property tables.
//!
//! A [`TypeInfo`] lists the persistable properties of one Rust type together
//! with getter/setter closures over the concrete type, so conversion never
//! needs runtime reflection.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::options::TableOptions;
use crate::error::DbError;
use crate::types::{DomainObject, FieldType, ObjectValue};

pub type Getter = Arc<dyn Fn(&dyn DomainObject) -> Result<ObjectValue, DbError> + Send + Sync>;
pub type Setter =
    Arc<dyn Fn(&mut dyn DomainObject, ObjectValue) -> Result<(), DbError> + Send + Sync>;
pub type Factory = Arc<dyn Fn() -> Box<dyn DomainObject> + Send + Sync>;

/// Key-component annotation of a composite-key property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyAnnotation {
    /// Whether the component belongs to the shard key
    pub shard_key: bool,
    /// Explicit position in the primary key
    pub order: Option<i32>,
}

impl Default for KeyAnnotation {
    fn default() -> Self {
        Self {
            shard_key: true,
            order: None,
        }
    }
}

/// Static part of a property: everything except the accessors.
///
/// This is also the shape of a property in a JSON entity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub key: Option<KeyAnnotation>,
    /// Not persisted
    #[serde(default)]
    pub transient: bool,
}

impl PropertyDecl {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            id: false,
            generated: false,
            key: None,
            transient: false,
        }
    }
}

#[derive(Clone)]
struct Accessors {
    getter: Getter,
    setter: Setter,
}

/// One property of a registered type.
#[derive(Clone)]
pub struct PropertyInfo {
    decl: PropertyDecl,
    accessors: Option<Accessors>,
}

impl PropertyInfo {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.decl.field_type
    }

    pub fn decl(&self) -> &PropertyDecl {
        &self.decl
    }

    pub fn is_id(&self) -> bool {
        self.decl.id
    }

    pub fn is_generated(&self) -> bool {
        self.decl.generated
    }

    pub fn is_transient(&self) -> bool {
        self.decl.transient
    }

    pub fn key(&self) -> Option<KeyAnnotation> {
        self.decl.key
    }

    /// Reads the property from an object of the owning type.
    pub fn get(&self, object: &dyn DomainObject) -> Result<ObjectValue, DbError> {
        let accessors = self.accessors()?;
        (accessors.getter)(object)
    }

    /// Writes the property into an object of the owning type.
    pub fn set(&self, object: &mut dyn DomainObject, value: ObjectValue) -> Result<(), DbError> {
        let accessors = self.accessors()?;
        (accessors.setter)(object, value)
    }

    fn accessors(&self) -> Result<&Accessors, DbError> {
        self.accessors.as_ref().ok_or_else(|| {
            DbError::mapping(format!(
                "property '{}' belongs to a schema-only type and has no accessors",
                self.decl.name
            ))
        })
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("decl", &self.decl)
            .field("has_accessors", &self.accessors.is_some())
            .finish()
    }
}

/// JSON form of a type, used by tooling that works without Rust types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub table: Option<TableOptions>,
    pub properties: Vec<PropertyDecl>,
}

/// The property table of one registered type.
#[derive(Clone)]
pub struct TypeInfo {
    name: String,
    type_id: Option<TypeId>,
    factory: Option<Factory>,
    properties: Vec<PropertyInfo>,
    table: Option<TableOptions>,
}

impl TypeInfo {
    /// Starts a property table for the Rust type `T`.
    ///
    /// # Arguments
    /// * `name` - Registered name, also written as the `#type` discriminator
    pub fn builder<T>(name: impl Into<String>) -> TypeInfoBuilder<T>
    where
        T: DomainObject + Default,
    {
        TypeInfoBuilder {
            name: name.into(),
            properties: Vec::new(),
            table: None,
            error: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Builds a schema-only type from its JSON definition. Such types can
    /// derive DDL and validate schemas but cannot convert objects.
    pub fn from_definition(definition: TypeDefinition) -> Self {
        Self {
            name: definition.name,
            type_id: None,
            factory: None,
            properties: definition
                .properties
                .into_iter()
                .map(|decl| PropertyInfo {
                    decl,
                    accessors: None,
                })
                .collect(),
            table: definition.table,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// Looks up a property by exact name.
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Table options; present only for entity types.
    pub fn table(&self) -> Option<&TableOptions> {
        self.table.as_ref()
    }

    pub fn is_entity(&self) -> bool {
        self.table.is_some()
    }

    /// Creates a default instance to be filled by property setters.
    pub fn instantiate(&self) -> Result<Box<dyn DomainObject>, DbError> {
        let factory = self.factory.as_ref().ok_or_else(|| {
            DbError::mapping(format!(
                "type '{}' is schema-only and cannot be instantiated",
                self.name
            ))
        })?;
        Ok(factory())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("properties", &self.properties)
            .field("table", &self.table)
            .finish()
    }
}

/// Builder for [`TypeInfo`].
///
/// Annotation methods (`id`, `generated`, `key`, `transient`) apply to the
/// most recently added property.
pub struct TypeInfoBuilder<T> {
    name: String,
    properties: Vec<PropertyInfo>,
    table: Option<TableOptions>,
    error: Option<DbError>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> TypeInfoBuilder<T>
where
    T: DomainObject + Default,
{
    /// Marks the type as an entity stored in its own table.
    pub fn table(mut self, options: TableOptions) -> Self {
        self.table = Some(options);
        self
    }

    /// Adds a property with typed accessors.
    ///
    /// # Arguments
    /// * `name` - Property name, also the document key
    /// * `field_type` - Declared type
    /// * `get` - Reads the property as an [`ObjectValue`]
    /// * `set` - Writes a decoded value back; usually `|o, v| { o.x = v.take()?; Ok(()) }`
    pub fn property<G, S>(mut self, name: &str, field_type: FieldType, get: G, set: S) -> Self
    where
        G: Fn(&T) -> ObjectValue + Send + Sync + 'static,
        S: Fn(&mut T, ObjectValue) -> Result<(), DbError> + Send + Sync + 'static,
    {
        if self.properties.iter().any(|p| p.name() == name) {
            self.fail(DbError::mapping(format!(
                "property '{}' declared twice on type '{}'",
                name, self.name
            )));
            return self;
        }

        let owner = self.name.clone();
        let getter: Getter = Arc::new(move |object: &dyn DomainObject| {
            object
                .as_any()
                .downcast_ref::<T>()
                .map(&get)
                .ok_or_else(|| wrong_receiver(&owner))
        });
        let owner = self.name.clone();
        let setter: Setter = Arc::new(move |object: &mut dyn DomainObject, value: ObjectValue| {
            let target = object
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| wrong_receiver(&owner))?;
            set(target, value)
        });

        self.properties.push(PropertyInfo {
            decl: PropertyDecl::new(name, field_type),
            accessors: Some(Accessors { getter, setter }),
        });
        self
    }

    /// Marks the last property as the id.
    pub fn id(self) -> Self {
        self.annotate("id", |decl| decl.id = true)
    }

    /// Marks the last property as store-generated.
    pub fn generated(self) -> Self {
        self.annotate("generated", |decl| decl.generated = true)
    }

    /// Marks the last property as a key component of a composite-key type.
    pub fn key(self, shard_key: bool, order: Option<i32>) -> Self {
        self.annotate("key", |decl| {
            decl.key = Some(KeyAnnotation { shard_key, order })
        })
    }

    /// Excludes the last property from persistence.
    pub fn transient(self) -> Self {
        self.annotate("transient", |decl| decl.transient = true)
    }

    /// Finishes the property table.
    ///
    /// # Returns
    /// `Err` if a property was declared twice or an annotation was applied
    /// before any property.
    pub fn build(self) -> Result<TypeInfo, DbError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let factory: Factory = Arc::new(|| Box::new(T::default()) as Box<dyn DomainObject>);
        Ok(TypeInfo {
            name: self.name,
            type_id: Some(TypeId::of::<T>()),
            factory: Some(factory),
            properties: self.properties,
            table: self.table,
        })
    }

    fn annotate(mut self, what: &str, apply: impl FnOnce(&mut PropertyDecl)) -> Self {
        match self.properties.last_mut() {
            Some(last) => apply(&mut last.decl),
            None => {
                let error = DbError::mapping(format!(
                    "'{}' annotation on type '{}' precedes every property",
                    what, self.name
                ));
                self.fail(error);
            }
        }
        self
    }

    fn fail(&mut self, error: DbError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn wrong_receiver(owner: &str) -> DbError {
    DbError::mapping(format!("accessor of type '{}' applied to another type", owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Note {
        id: i64,
        text: String,
    }

    fn note_info() -> TypeInfo {
        TypeInfo::builder::<Note>("Note")
            .table(TableOptions::default())
            .property("id", FieldType::Long, |n| n.id.into(), |n, v| {
                n.id = v.take()?;
                Ok(())
            })
            .id()
            .generated()
            .property("text", FieldType::String, |n| n.text.clone().into(), |n, v| {
                n.text = v.take()?;
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_accessors_roundtrip() {
        let info = note_info();
        let mut object = info.instantiate().unwrap();
        info.property("text")
            .unwrap()
            .set(object.as_mut(), ObjectValue::from("hello"))
            .unwrap();

        let text = info.property("text").unwrap().get(object.as_ref()).unwrap();
        assert_eq!(text, ObjectValue::from("hello"));
        assert!(info.property("id").unwrap().is_generated());
        assert_eq!(info.type_id(), Some(TypeId::of::<Note>()));
    }

    #[test]
    fn test_accessor_rejects_other_type() {
        let info = note_info();
        let other = String::from("not a note");
        assert!(info.property("id").unwrap().get(&other).is_err());
    }

    #[test]
    fn test_duplicate_property_fails_build() {
        let result = TypeInfo::builder::<Note>("Note")
            .property("id", FieldType::Long, |n| n.id.into(), |_, _| Ok(()))
            .property("id", FieldType::Long, |n| n.id.into(), |_, _| Ok(()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_annotation_without_property_fails_build() {
        assert!(TypeInfo::builder::<Note>("Note").id().build().is_err());
    }

    #[test]
    fn test_schema_only_definition() {
        let definition: TypeDefinition = serde_json::from_str(
            r#"{"name": "Book", "table": {"table_name": "books"},
                "properties": [{"name": "isbn", "type": "string", "id": true},
                               {"name": "pages", "type": "int"}]}"#,
        )
        .unwrap();
        let info = TypeInfo::from_definition(definition);
        assert!(info.is_entity());
        assert!(info.property("isbn").unwrap().is_id());
        assert!(info.instantiate().is_err());
        assert!(info.property("pages").unwrap().get(&0i32).is_err());
    }
}
