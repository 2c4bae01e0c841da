//! Object → row direction.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveTime, SecondsFormat};

use super::row::Row;
use super::{RowConverter, DATE_FORMAT, TIMESTAMP_FORMAT, TYPE_DISCRIMINATOR};
use crate::error::DbError;
use crate::mapping::{EntityDescriptor, ResolvedPath, DOCUMENT_COLUMN};
use crate::types::{
    classify_for_write, BoxedObject, DomainObject, FieldType, FieldValue, ObjectValue, TypeCode,
};

impl RowConverter<'_> {
    /// Converts an entity object into its row.
    ///
    /// # Arguments
    /// * `object` - Entity instance of a registered type
    /// * `skip_id` - Leave the key columns out, for ids the store generates
    ///
    /// # Returns
    /// The row, or `DbError::MissingId` if the id is null and not skipped.
    pub fn to_row(&self, object: &dyn DomainObject, skip_id: bool) -> Result<Row, DbError> {
        let info = self.context.registry().info_of_object(object)?;
        let entity = self.context.entity_for(&info)?;

        let mut row = Row::new();
        if !skip_id {
            let id = entity.id().get(object)?;
            row.extend(self.id_to_key(&entity, &id)?);
        }

        let mut document = BTreeMap::new();
        for property in entity.properties().iter().filter(|p| p.is_writable) {
            let value = property.get(object)?;
            let encoded = self.encode(&property.name, &property.field_type, &value)?;
            if !encoded.is_null() {
                document.insert(property.name.clone(), encoded);
            }
        }
        row.insert(DOCUMENT_COLUMN, FieldValue::Map(document));
        Ok(row)
    }

    /// Builds the partial row addressing one entity by id.
    ///
    /// Composite ids expand into one entry per key component.
    pub fn id_to_key(&self, entity: &EntityDescriptor, id: &ObjectValue) -> Result<Row, DbError> {
        let missing = || DbError::MissingId {
            entity: entity.type_name().to_string(),
        };
        if id.is_null() {
            return Err(missing());
        }

        let mut key = Row::new();
        if entity.is_composite() {
            let ObjectValue::Object(boxed) = id else {
                return Err(DbError::mapping(format!(
                    "composite id of entity '{}' must be an object, got {}",
                    entity.type_name(),
                    id.kind_name()
                )));
            };
            for column in entity.key_columns() {
                let value = column.property.get(boxed.get())?;
                if value.is_null() {
                    return Err(missing());
                }
                key.insert(column.name.clone(), key_value(&column.property.field_type, &value)?);
            }
        } else {
            let column = entity.key_columns().first().ok_or_else(missing)?;
            key.insert(column.name.clone(), key_value(&column.property.field_type, id)?);
        }
        Ok(key)
    }

    /// Encodes a value to bind against a resolved property path.
    ///
    /// Key paths get typed key values, document paths the document
    /// encoding. A list bound against a scalar path is encoded element-wise,
    /// and a scalar bound against a sequence path is encoded as an element.
    pub fn to_bind_value(
        &self,
        path: &ResolvedPath<'_>,
        value: &ObjectValue,
    ) -> Result<FieldValue, DbError> {
        let declared = path.field_type();
        match (value, declared.element_type()) {
            (ObjectValue::List(items), None) => items
                .iter()
                .map(|item| self.bind_scalar(path, declared, item))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Array),
            (ObjectValue::List(_), Some(_)) => self.bind_scalar(path, declared, value),
            (_, Some(element)) => self.bind_scalar(path, element, value),
            (_, None) => self.bind_scalar(path, declared, value),
        }
    }

    fn bind_scalar(
        &self,
        path: &ResolvedPath<'_>,
        declared: &FieldType,
        value: &ObjectValue,
    ) -> Result<FieldValue, DbError> {
        match path {
            ResolvedPath::Key { .. } if value.is_null() => Ok(FieldValue::Null),
            ResolvedPath::Key { .. } => key_value(declared, value),
            ResolvedPath::Document { path, .. } => self.encode(path, declared, value),
        }
    }

    /// Encodes one property value into its document representation.
    pub(crate) fn encode(
        &self,
        path: &str,
        declared: &FieldType,
        value: &ObjectValue,
    ) -> Result<FieldValue, DbError> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        let encoded = match (classify_for_write(declared, value), value) {
            (TypeCode::String, ObjectValue::String(s)) => FieldValue::String(s.clone()),
            (TypeCode::Enum, ObjectValue::Enum(s) | ObjectValue::String(s)) => {
                FieldValue::String(s.clone())
            }
            (TypeCode::Int, ObjectValue::Int(v)) => FieldValue::Integer(*v),
            (TypeCode::Long, ObjectValue::Long(v)) => FieldValue::Long(*v),
            (TypeCode::Long, ObjectValue::Int(v)) => FieldValue::Long(i64::from(*v)),
            (TypeCode::Float | TypeCode::Double, ObjectValue::Float(v)) => {
                FieldValue::Double(f64::from(*v))
            }
            (TypeCode::Float | TypeCode::Double, ObjectValue::Double(v)) => FieldValue::Double(*v),
            (TypeCode::BigInteger, ObjectValue::BigInteger(v)) => FieldValue::BigNumber(v.clone()),
            (TypeCode::BigDecimal, ObjectValue::Decimal(v)) => FieldValue::Number(*v),
            (TypeCode::Boolean, ObjectValue::Bool(v)) => FieldValue::Boolean(*v),
            (TypeCode::Bytes, ObjectValue::Bytes(v)) => FieldValue::String(STANDARD.encode(v)),
            (TypeCode::Date, ObjectValue::Date(v)) => {
                FieldValue::String(v.format(DATE_FORMAT).to_string())
            }
            (TypeCode::Timestamp, ObjectValue::Timestamp(v)) => {
                FieldValue::String(v.format(TIMESTAMP_FORMAT).to_string())
            }
            (TypeCode::Instant, ObjectValue::Instant(v)) => {
                FieldValue::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            (TypeCode::GeoPoint, ObjectValue::Point(p)) => p.to_field_value(),
            (TypeCode::GeoPolygon, ObjectValue::Polygon(p)) => p.to_field_value(),
            (TypeCode::NativeValue, ObjectValue::Native(v)) => v.clone(),
            (TypeCode::Map, ObjectValue::Map(entries)) => self.encode_map(path, declared, entries)?,
            (TypeCode::Array | TypeCode::Collection, ObjectValue::List(items)) => {
                let element = declared.element_type().unwrap_or(&FieldType::Any);
                items
                    .iter()
                    .map(|item| self.encode(path, element, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::Array)?
            }
            (TypeCode::Pojo, ObjectValue::Object(object)) => {
                self.encode_object(path, declared, object)?
            }
            (_, other) => {
                return Err(DbError::mapping(format!(
                    "property '{}' declared as {} holds a {} value",
                    path,
                    declared,
                    other.kind_name()
                )))
            }
        };
        Ok(encoded)
    }

    fn encode_map(
        &self,
        path: &str,
        declared: &FieldType,
        entries: &[(ObjectValue, ObjectValue)],
    ) -> Result<FieldValue, DbError> {
        let (declared_key, declared_value) = match declared {
            FieldType::Map { key, value } => (key.as_ref(), value.as_ref()),
            _ => (&FieldType::Any, &FieldType::Any),
        };
        if !matches!(declared_key, FieldType::String | FieldType::Enum | FieldType::Any) {
            return Err(DbError::UnsupportedMapKey {
                property: path.to_string(),
                key_type: declared_key.to_string(),
            });
        }

        let mut map = BTreeMap::new();
        for (key, value) in entries {
            let key = match key {
                ObjectValue::String(k) | ObjectValue::Enum(k) => k.clone(),
                other => {
                    return Err(DbError::UnsupportedMapKey {
                        property: path.to_string(),
                        key_type: other.kind_name().to_string(),
                    })
                }
            };
            map.insert(key, self.encode(path, declared_value, value)?);
        }
        Ok(FieldValue::Map(map))
    }

    /// Encodes a nested object, tagging it with its type name when the
    /// runtime type is not the declared one.
    fn encode_object(
        &self,
        path: &str,
        declared: &FieldType,
        object: &BoxedObject,
    ) -> Result<FieldValue, DbError> {
        let info = self.context.registry().info_of_object(object.get())?;

        let mut map = BTreeMap::new();
        let declared_name = match declared {
            FieldType::Object(name) => Some(name.as_str()),
            _ => None,
        };
        if declared_name != Some(info.name()) {
            map.insert(
                TYPE_DISCRIMINATOR.to_string(),
                FieldValue::String(info.name().to_string()),
            );
        }

        for property in info.properties().iter().filter(|p| !p.is_transient()) {
            let value = property.get(object.get())?;
            let nested_path = format!("{}.{}", path, property.name());
            let encoded = self.encode(&nested_path, property.field_type(), &value)?;
            if !encoded.is_null() {
                map.insert(property.name().to_string(), encoded);
            }
        }
        Ok(FieldValue::Map(map))
    }
}

/// Encodes a key column value; date and time types become timestamps.
pub(crate) fn key_value(declared: &FieldType, value: &ObjectValue) -> Result<FieldValue, DbError> {
    let encoded = match value {
        ObjectValue::String(s) | ObjectValue::Enum(s) => FieldValue::String(s.clone()),
        ObjectValue::Int(v) if *declared == FieldType::Long => FieldValue::Long(i64::from(*v)),
        ObjectValue::Int(v) => FieldValue::Integer(*v),
        ObjectValue::Long(v) => FieldValue::Long(*v),
        ObjectValue::Float(v) => FieldValue::Float(*v),
        ObjectValue::Double(v) => FieldValue::Double(*v),
        ObjectValue::BigInteger(v) => FieldValue::BigNumber(v.clone()),
        ObjectValue::Decimal(v) => FieldValue::Number(*v),
        ObjectValue::Bool(v) => FieldValue::Boolean(*v),
        ObjectValue::Date(v) => FieldValue::Timestamp(v.and_time(NaiveTime::MIN).and_utc()),
        ObjectValue::Timestamp(v) => FieldValue::Timestamp(v.and_utc()),
        ObjectValue::Instant(v) => FieldValue::Timestamp(*v),
        other => {
            return Err(DbError::UnsupportedType {
                type_name: other.kind_name().to_string(),
                reason: format!("cannot be used as a {} key value", declared),
            })
        }
    };
    Ok(encoded)
}
