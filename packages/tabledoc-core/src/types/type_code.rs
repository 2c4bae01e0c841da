//! Serialization taxonomy for property types.

use super::{FieldType, ObjectValue};

/// How a property value is serialized into, and deserialized from, the row.
///
/// Atomic codes are terminal. `Array`, `Collection` and `Pojo` recurse into
/// their elements or properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    String,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Boolean,
    Bytes,
    Date,
    Timestamp,
    Instant,
    GeoPoint,
    GeoPolygon,
    Enum,
    Map,
    NativeValue,
    Array,
    Collection,
    Pojo,
}

impl TypeCode {
    /// Returns `true` for codes that need no recursive conversion.
    pub fn is_atomic(self) -> bool {
        !matches!(self, TypeCode::Array | TypeCode::Collection | TypeCode::Pojo)
    }

    /// Returns `true` for date and time codes.
    pub fn is_temporal(self) -> bool {
        matches!(self, TypeCode::Date | TypeCode::Timestamp | TypeCode::Instant)
    }

    /// Classifies a runtime value. `Null` has no code.
    pub fn of_value(value: &ObjectValue) -> Option<TypeCode> {
        let code = match value {
            ObjectValue::Null => return None,
            ObjectValue::String(_) => TypeCode::String,
            ObjectValue::Int(_) => TypeCode::Int,
            ObjectValue::Long(_) => TypeCode::Long,
            ObjectValue::Float(_) => TypeCode::Float,
            ObjectValue::Double(_) => TypeCode::Double,
            ObjectValue::BigInteger(_) => TypeCode::BigInteger,
            ObjectValue::Decimal(_) => TypeCode::BigDecimal,
            ObjectValue::Bool(_) => TypeCode::Boolean,
            ObjectValue::Bytes(_) => TypeCode::Bytes,
            ObjectValue::Date(_) => TypeCode::Date,
            ObjectValue::Timestamp(_) => TypeCode::Timestamp,
            ObjectValue::Instant(_) => TypeCode::Instant,
            ObjectValue::Point(_) => TypeCode::GeoPoint,
            ObjectValue::Polygon(_) => TypeCode::GeoPolygon,
            ObjectValue::Enum(_) => TypeCode::Enum,
            ObjectValue::Map(_) => TypeCode::Map,
            ObjectValue::Native(_) => TypeCode::NativeValue,
            ObjectValue::List(_) => TypeCode::Collection,
            ObjectValue::Object(_) => TypeCode::Pojo,
        };
        Some(code)
    }
}

fn classify_declared(declared: &FieldType) -> TypeCode {
    match declared {
        FieldType::String => TypeCode::String,
        FieldType::Int => TypeCode::Int,
        FieldType::Long => TypeCode::Long,
        FieldType::Float => TypeCode::Float,
        FieldType::Double => TypeCode::Double,
        FieldType::BigInteger => TypeCode::BigInteger,
        FieldType::BigDecimal => TypeCode::BigDecimal,
        FieldType::Bool => TypeCode::Boolean,
        FieldType::Bytes => TypeCode::Bytes,
        FieldType::Timestamp => TypeCode::Timestamp,
        FieldType::Instant => TypeCode::Instant,
        FieldType::Date => TypeCode::Date,
        FieldType::GeoPoint => TypeCode::GeoPoint,
        FieldType::GeoPolygon => TypeCode::GeoPolygon,
        FieldType::Enum => TypeCode::Enum,
        FieldType::Map { .. } => TypeCode::Map,
        FieldType::Native => TypeCode::NativeValue,
        FieldType::Array(_) => TypeCode::Array,
        FieldType::Collection(_) => TypeCode::Collection,
        FieldType::Object(_) | FieldType::Any => TypeCode::Pojo,
    }
}

/// Classifies a property for the object → row direction.
///
/// Opaque and object-typed declarations are classified by the runtime value,
/// so a runtime subtype or a scalar stored in an `Any` property is written
/// with its own representation.
pub fn classify_for_write(declared: &FieldType, value: &ObjectValue) -> TypeCode {
    match declared {
        FieldType::Any | FieldType::Object(_) => {
            TypeCode::of_value(value).unwrap_or_else(|| classify_declared(declared))
        }
        _ => classify_declared(declared),
    }
}

/// Classifies a property for the row → object direction.
///
/// Only the declared type is known here. Decoding under the returned code
/// accepts every stored representation that code can come from: `Bytes`
/// accepts a base64 string, `Float` and `Double` accept any number, and
/// `Pojo` resolves through a type discriminator, a geo shape, or falls back
/// to an untyped map.
pub fn classify_for_read(declared: &FieldType) -> TypeCode {
    classify_declared(declared)
}
