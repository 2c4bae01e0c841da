//! Row → object direction.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::row::Row;
use super::{RowConverter, DATE_FORMAT, TIMESTAMP_FORMAT, TYPE_DISCRIMINATOR};
use crate::error::DbError;
use crate::mapping::{EntityDescriptor, TypeInfo, DOCUMENT_COLUMN};
use crate::types::{
    classify_for_read, BoxedObject, DomainObject, FieldType, FieldValue, GeoPoint, GeoPolygon,
    ObjectValue, TypeCode,
};

impl RowConverter<'_> {
    /// Converts a row into an object of type `info`.
    ///
    /// At the root, `info` must be an entity: id values come from the key
    /// columns and everything else from the document column. Below the root
    /// the row's columns are decoded as the properties of `info`.
    pub fn from_row(
        &self,
        info: &Arc<TypeInfo>,
        row: &Row,
        is_root: bool,
    ) -> Result<Box<dyn DomainObject>, DbError> {
        if is_root {
            let entity = self.context.entity_for(info)?;
            self.entity_from_row(&entity, row)
        } else {
            self.decode_object(info, row.as_map())
        }
    }

    /// Converts a row into an entity of type `T`.
    pub fn read<T: DomainObject>(&self, row: &Row) -> Result<T, DbError> {
        let entity = self.context.entity::<T>()?;
        let object = self.entity_from_row(&entity, row)?;
        BoxedObject::from_box(object).downcast::<T>()
    }

    /// Converts a row into an entity described by `entity`.
    pub fn entity_from_row(
        &self,
        entity: &EntityDescriptor,
        row: &Row,
    ) -> Result<Box<dyn DomainObject>, DbError> {
        let mut object = entity.info().instantiate()?;

        if let Some(id) = self.id_from_row(entity, row)? {
            entity.id().set(object.as_mut(), id)?;
        }
        if let Some(document) = row.document() {
            for property in entity.properties() {
                if let Some(stored) = document.get(&property.name) {
                    let value = self.decode(&property.field_type, stored)?;
                    property.set(object.as_mut(), value)?;
                }
            }
        }
        Ok(object)
    }

    /// Converts a row of `entity`'s table into an object of projection type
    /// `info`.
    ///
    /// Key columns and document entries are matched to the projection's
    /// properties by name. A composite id is rebuilt from its key columns.
    pub fn projection_from_row(
        &self,
        entity: &EntityDescriptor,
        info: &TypeInfo,
        row: &Row,
    ) -> Result<Box<dyn DomainObject>, DbError> {
        let mut map = row.as_map().clone();
        if let Some(FieldValue::Map(document)) = map.remove(DOCUMENT_COLUMN) {
            map.extend(document);
        }
        let mut object = self.decode_object(info, &map)?;

        if entity.is_composite() {
            let id = info
                .property(&entity.id().name)
                .filter(|property| !property.is_transient());
            if let Some(property) = id {
                if let Some(value) = self.id_from_row(entity, row)? {
                    property.set(object.as_mut(), value)?;
                }
            }
        }
        Ok(object)
    }

    /// Decodes the id from the key columns present in `row`.
    fn id_from_row(
        &self,
        entity: &EntityDescriptor,
        row: &Row,
    ) -> Result<Option<ObjectValue>, DbError> {
        let Some(key_type) = entity.key_type() else {
            return entity
                .key_columns()
                .first()
                .and_then(|column| row.get(&column.name).map(|stored| (column, stored)))
                .map(|(column, stored)| self.decode(&column.property.field_type, stored))
                .transpose();
        };

        let mut key = key_type.instantiate()?;
        let mut found = false;
        for column in entity.key_columns() {
            if let Some(stored) = row.get(&column.name) {
                let value = self.decode(&column.property.field_type, stored)?;
                column.property.set(key.as_mut(), value)?;
                found = true;
            }
        }
        Ok(found.then(|| ObjectValue::Object(BoxedObject::from_box(key))))
    }

    /// Decodes a stored value as the declared type.
    ///
    /// Accepts every stored representation the declared type can come
    /// from: typed key values as well as document encodings.
    pub(crate) fn decode(
        &self,
        declared: &FieldType,
        stored: &FieldValue,
    ) -> Result<ObjectValue, DbError> {
        if stored.is_null() {
            return Ok(ObjectValue::Null);
        }
        let mismatch = || {
            DbError::mapping(format!(
                "cannot decode stored {} value {} as {}",
                stored.type_name(),
                stored,
                declared
            ))
        };

        let value = match classify_for_read(declared) {
            TypeCode::String => ObjectValue::String(stored.as_str().ok_or_else(mismatch)?.to_string()),
            TypeCode::Enum => ObjectValue::Enum(stored.as_str().ok_or_else(mismatch)?.to_string()),
            TypeCode::Int => {
                let v = stored.as_i64().ok_or_else(mismatch)?;
                ObjectValue::Int(i32::try_from(v).map_err(|_| mismatch())?)
            }
            TypeCode::Long => ObjectValue::Long(stored.as_i64().ok_or_else(mismatch)?),
            TypeCode::Float => ObjectValue::Float(stored.as_f64().ok_or_else(mismatch)? as f32),
            TypeCode::Double => ObjectValue::Double(stored.as_f64().ok_or_else(mismatch)?),
            TypeCode::BigInteger => ObjectValue::BigInteger(decode_big_integer(stored).ok_or_else(mismatch)?),
            TypeCode::BigDecimal => ObjectValue::Decimal(decode_decimal(stored).ok_or_else(mismatch)?),
            TypeCode::Boolean => ObjectValue::Bool(stored.as_bool().ok_or_else(mismatch)?),
            TypeCode::Bytes => ObjectValue::Bytes(decode_bytes(stored).ok_or_else(mismatch)?),
            TypeCode::Date => ObjectValue::Date(decode_date(stored).ok_or_else(mismatch)?),
            TypeCode::Timestamp => {
                ObjectValue::Timestamp(decode_timestamp(stored).ok_or_else(mismatch)?)
            }
            TypeCode::Instant => ObjectValue::Instant(decode_instant(stored).ok_or_else(mismatch)?),
            TypeCode::GeoPoint => {
                ObjectValue::Point(GeoPoint::from_field_value(stored).ok_or_else(mismatch)?)
            }
            TypeCode::GeoPolygon => {
                ObjectValue::Polygon(GeoPolygon::from_field_value(stored).ok_or_else(mismatch)?)
            }
            TypeCode::NativeValue => ObjectValue::Native(stored.clone()),
            TypeCode::Map => {
                let map = stored.as_map().ok_or_else(mismatch)?;
                let (key_type, value_type) = match declared {
                    FieldType::Map { key, value } => (key.as_ref(), value.as_ref()),
                    _ => (&FieldType::Any, &FieldType::Any),
                };
                let mut entries = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let key = match key_type {
                        FieldType::Enum => ObjectValue::Enum(key.clone()),
                        _ => ObjectValue::String(key.clone()),
                    };
                    entries.push((key, self.decode(value_type, value)?));
                }
                ObjectValue::Map(entries)
            }
            TypeCode::Array | TypeCode::Collection => {
                let items = stored.as_array().ok_or_else(mismatch)?;
                let element = declared.element_type().unwrap_or(&FieldType::Any);
                items
                    .iter()
                    .map(|item| self.decode(element, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ObjectValue::List)?
            }
            TypeCode::Pojo => self.decode_nested(declared, stored)?,
        };
        Ok(value)
    }

    /// Decodes a nested object: by discriminator, by geo shape, as the
    /// declared type, or as an untyped map, in that order.
    fn decode_nested(
        &self,
        declared: &FieldType,
        stored: &FieldValue,
    ) -> Result<ObjectValue, DbError> {
        let declared_name = match declared {
            FieldType::Object(name) => Some(name.as_str()),
            _ => None,
        };

        let Some(map) = stored.as_map() else {
            return match declared_name {
                None => Ok(decode_untyped(stored)),
                Some(name) => Err(DbError::mapping(format!(
                    "cannot decode stored {} value as {}",
                    stored.type_name(),
                    name
                ))),
            };
        };

        if let Some(tag) = map.get(TYPE_DISCRIMINATOR).and_then(FieldValue::as_str) {
            if let Some(info) = self.context.registry().get(tag) {
                return self.wrap_object(&info, map);
            }
            tracing::debug!(
                "Unknown type discriminator '{}', decoding as {}",
                tag,
                declared_name.unwrap_or("untyped map")
            );
        } else if declared_name.is_none() {
            if let Some(point) = GeoPoint::from_field_value(stored) {
                return Ok(ObjectValue::Point(point));
            }
            if let Some(polygon) = GeoPolygon::from_field_value(stored) {
                return Ok(ObjectValue::Polygon(polygon));
            }
        }

        match declared_name {
            Some(name) => {
                let info = self
                    .context
                    .registry()
                    .get(name)
                    .ok_or_else(|| DbError::UnregisteredType(name.to_string()))?;
                self.wrap_object(&info, map)
            }
            None => Ok(decode_untyped(stored)),
        }
    }

    fn wrap_object(
        &self,
        info: &TypeInfo,
        map: &BTreeMap<String, FieldValue>,
    ) -> Result<ObjectValue, DbError> {
        let object = self.decode_object(info, map)?;
        Ok(ObjectValue::Object(BoxedObject::from_box(object)))
    }

    fn decode_object(
        &self,
        info: &TypeInfo,
        map: &BTreeMap<String, FieldValue>,
    ) -> Result<Box<dyn DomainObject>, DbError> {
        let mut object = info.instantiate()?;
        for property in info.properties().iter().filter(|p| !p.is_transient()) {
            if let Some(stored) = map.get(property.name()) {
                let value = self.decode(property.field_type(), stored)?;
                property.set(object.as_mut(), value)?;
            }
        }
        Ok(object)
    }
}

/// Decodes without a declared type; geo shapes are recognized by shape.
fn decode_untyped(stored: &FieldValue) -> ObjectValue {
    match stored {
        FieldValue::Null => ObjectValue::Null,
        FieldValue::Integer(v) => ObjectValue::Int(*v),
        FieldValue::Long(v) => ObjectValue::Long(*v),
        FieldValue::Float(v) => ObjectValue::Float(*v),
        FieldValue::Double(v) => ObjectValue::Double(*v),
        FieldValue::Number(v) => ObjectValue::Decimal(*v),
        FieldValue::BigNumber(v) => ObjectValue::BigInteger(v.clone()),
        FieldValue::String(v) => ObjectValue::String(v.clone()),
        FieldValue::Boolean(v) => ObjectValue::Bool(*v),
        FieldValue::Binary(v) => ObjectValue::Bytes(v.clone()),
        FieldValue::Timestamp(v) => ObjectValue::Instant(*v),
        FieldValue::Array(items) => ObjectValue::List(items.iter().map(decode_untyped).collect()),
        FieldValue::Map(map) => {
            if let Some(point) = GeoPoint::from_field_value(stored) {
                return ObjectValue::Point(point);
            }
            if let Some(polygon) = GeoPolygon::from_field_value(stored) {
                return ObjectValue::Polygon(polygon);
            }
            ObjectValue::Map(
                map.iter()
                    .map(|(k, v)| (ObjectValue::String(k.clone()), decode_untyped(v)))
                    .collect(),
            )
        }
    }
}

fn decode_big_integer(stored: &FieldValue) -> Option<BigInt> {
    match stored {
        FieldValue::BigNumber(v) => Some(v.clone()),
        FieldValue::Number(d) => BigInt::from_str(&d.trunc().normalize().to_string()).ok(),
        FieldValue::String(s) => BigInt::from_str(s).ok(),
        other => other.as_i64().map(BigInt::from),
    }
}

fn decode_decimal(stored: &FieldValue) -> Option<Decimal> {
    match stored {
        FieldValue::Number(d) => Some(*d),
        FieldValue::BigNumber(v) => Decimal::from_str(&v.to_string()).ok(),
        FieldValue::Integer(v) => Some(Decimal::from(*v)),
        FieldValue::Long(v) => Some(Decimal::from(*v)),
        FieldValue::Double(v) => Decimal::from_f64(*v),
        FieldValue::Float(v) => Decimal::from_f32(*v),
        FieldValue::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn decode_bytes(stored: &FieldValue) -> Option<Vec<u8>> {
    match stored {
        FieldValue::Binary(b) => Some(b.clone()),
        FieldValue::String(s) => STANDARD.decode(s).ok(),
        _ => None,
    }
}

fn decode_date(stored: &FieldValue) -> Option<NaiveDate> {
    match stored {
        FieldValue::Timestamp(t) => Some(t.date_naive()),
        FieldValue::String(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .ok()
            .or_else(|| parse_local(s).map(|t| t.date())),
        _ => None,
    }
}

fn decode_timestamp(stored: &FieldValue) -> Option<NaiveDateTime> {
    match stored {
        FieldValue::Timestamp(t) => Some(t.naive_utc()),
        FieldValue::String(s) => parse_local(s),
        _ => None,
    }
}

fn decode_instant(stored: &FieldValue) -> Option<DateTime<Utc>> {
    match stored {
        FieldValue::Timestamp(t) => Some(*t),
        FieldValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok().map(|t| t.and_utc())),
        _ => None,
    }
}

fn parse_local(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_utc()))
}
