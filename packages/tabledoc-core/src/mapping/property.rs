use super::type_info::PropertyInfo;
use crate::error::DbError;
use crate::types::{classify_for_read, DomainObject, FieldType, ObjectValue, TypeCode};

/// Derived metadata of one persisted property.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Read-direction classification of the declared type
    pub type_code: TypeCode,
    pub is_id: bool,
    /// Component of a composite key type
    pub is_key_component: bool,
    pub is_writable: bool,
    /// Id whose type is a composite key type
    pub is_composite_key: bool,
    info: PropertyInfo,
}

impl PropertyDescriptor {
    pub(crate) fn new(info: &PropertyInfo) -> Self {
        let is_composite_key = info.is_id() && matches!(info.field_type(), FieldType::Object(_));
        Self {
            name: info.name().to_string(),
            field_type: info.field_type().clone(),
            type_code: classify_for_read(info.field_type()),
            is_id: info.is_id(),
            is_key_component: info.key().is_some(),
            is_writable: !info.is_transient(),
            is_composite_key,
            info: info.clone(),
        }
    }

    pub(crate) fn as_key_component(mut self) -> Self {
        self.is_key_component = true;
        self
    }

    pub fn get(&self, object: &dyn DomainObject) -> Result<ObjectValue, DbError> {
        self.info.get(object)
    }

    pub fn set(&self, object: &mut dyn DomainObject, value: ObjectValue) -> Result<(), DbError> {
        self.info.set(object, value)
    }
}
