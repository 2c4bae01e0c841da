//! Store-side value representation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// A value as the store reads and writes it.
///
/// Key columns carry typed scalars. The document column carries a nested
/// tree of maps, arrays and scalars.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// SQL or JSON null
    Null,
    /// 32-bit integer
    Integer(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float (key columns only; documents widen to `Double`)
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Arbitrary precision number
    Number(Decimal),
    /// Integral number of unbounded size
    #[serde(serialize_with = "digits")]
    BigNumber(BigInt),
    /// UTF-8 string
    String(String),
    /// Boolean
    Boolean(bool),
    /// Binary blob
    Binary(Vec<u8>),
    /// Timestamp (key columns only; documents store formatted strings)
    Timestamp(DateTime<Utc>),
    /// Ordered array
    Array(Vec<FieldValue>),
    /// String-keyed map
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Returns the store type name of this value, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "NULL",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Long(_) => "LONG",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::Double(_) => "DOUBLE",
            FieldValue::Number(_) | FieldValue::BigNumber(_) => "NUMBER",
            FieldValue::String(_) => "STRING",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Binary(_) => "BINARY",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::Array(_) => "ARRAY",
            FieldValue::Map(_) => "MAP",
        }
    }

    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as `i64` for integral values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(i64::from(*v)),
            FieldValue::Long(v) => Some(*v),
            FieldValue::Number(d) if d.fract().is_zero() => d.trunc().to_string().parse().ok(),
            FieldValue::BigNumber(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as `f64` for any numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(f64::from(*v)),
            FieldValue::Long(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            FieldValue::Number(d) => d.to_string().parse().ok(),
            FieldValue::BigNumber(v) => v.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the map payload, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the array payload, if this is an array.
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// Writes a big number as its decimal digits.
fn digits<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}
