//! Declared (static) field types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The static type a property is declared with.
///
/// Serialized form is used by JSON entity definitions: scalar types are
/// plain strings (`"string"`, `"long"`), containers are single-key objects
/// (`{"collection": "string"}`, `{"object": "Address"}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Bool,
    Bytes,
    /// Calendar date
    Date,
    /// Local date-time
    Timestamp,
    /// UTC instant
    Instant,
    GeoPoint,
    GeoPolygon,
    /// Enumeration stored by variant name
    Enum,
    /// A store value kept as is
    Native,
    /// Opaque; the runtime value decides
    Any,
    Map {
        key: Box<FieldType>,
        value: Box<FieldType>,
    },
    Array(Box<FieldType>),
    Collection(Box<FieldType>),
    /// A registered type, by registered name
    Object(String),
}

impl FieldType {
    pub fn array(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    pub fn collection(element: FieldType) -> Self {
        FieldType::Collection(Box::new(element))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        FieldType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        FieldType::Object(name.into())
    }

    /// Returns `true` for date and time types, which the document column
    /// stores as formatted strings.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldType::Date | FieldType::Timestamp | FieldType::Instant
        )
    }

    /// Returns `true` for arrays and collections.
    pub fn is_sequence(&self) -> bool {
        matches!(self, FieldType::Array(_) | FieldType::Collection(_))
    }

    /// Returns the element type of an array or collection.
    pub fn element_type(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array(e) | FieldType::Collection(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the column type used when this type backs a primary key
    /// column, or `None` if it cannot be a key.
    pub fn key_sql_type(&self) -> Option<&'static str> {
        match self {
            FieldType::String | FieldType::Enum => Some("STRING"),
            FieldType::Int => Some("INTEGER"),
            FieldType::Long => Some("LONG"),
            FieldType::Float => Some("FLOAT"),
            FieldType::Double => Some("DOUBLE"),
            FieldType::BigInteger | FieldType::BigDecimal => Some("NUMBER"),
            FieldType::Bool => Some("BOOLEAN"),
            FieldType::Date => Some("TIMESTAMP(3)"),
            FieldType::Timestamp | FieldType::Instant => Some("TIMESTAMP(9)"),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Float => write!(f, "float"),
            FieldType::Double => write!(f, "double"),
            FieldType::BigInteger => write!(f, "big_integer"),
            FieldType::BigDecimal => write!(f, "big_decimal"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Date => write!(f, "date"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Instant => write!(f, "instant"),
            FieldType::GeoPoint => write!(f, "geo_point"),
            FieldType::GeoPolygon => write!(f, "geo_polygon"),
            FieldType::Enum => write!(f, "enum"),
            FieldType::Native => write!(f, "native"),
            FieldType::Any => write!(f, "any"),
            FieldType::Map { key, value } => write!(f, "map<{}, {}>", key, value),
            FieldType::Array(e) => write!(f, "array<{}>", e),
            FieldType::Collection(e) => write!(f, "collection<{}>", e),
            FieldType::Object(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_sql_types() {
        assert_eq!(FieldType::String.key_sql_type(), Some("STRING"));
        assert_eq!(FieldType::Long.key_sql_type(), Some("LONG"));
        assert_eq!(FieldType::BigDecimal.key_sql_type(), Some("NUMBER"));
        assert_eq!(FieldType::Instant.key_sql_type(), Some("TIMESTAMP(9)"));
        assert_eq!(FieldType::Bytes.key_sql_type(), None);
        assert_eq!(FieldType::collection(FieldType::String).key_sql_type(), None);
    }

    #[test]
    fn test_serde_shape() {
        let ty: FieldType = serde_json::from_str(r#"{"collection": "string"}"#).unwrap();
        assert_eq!(ty, FieldType::collection(FieldType::String));

        let ty: FieldType =
            serde_json::from_str(r#"{"map": {"key": "enum", "value": {"object": "Address"}}}"#)
                .unwrap();
        assert_eq!(ty, FieldType::map(FieldType::Enum, FieldType::object("Address")));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            FieldType::map(FieldType::String, FieldType::array(FieldType::Int)).to_string(),
            "map<string, array<int>>"
        );
    }
}
