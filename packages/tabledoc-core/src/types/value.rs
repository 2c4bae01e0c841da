//! In-memory property values and the domain object abstraction.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;

use super::{FieldValue, GeoPoint, GeoPolygon};
use crate::error::DbError;

/// A persistable object.
///
/// Implemented automatically for every `Clone + PartialEq + Debug + Send +
/// Sync + 'static` type; the mapping metadata lives in the type's registered
/// [`TypeInfo`](crate::mapping::TypeInfo), not in this trait.
pub trait DomainObject: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn object_type_id(&self) -> TypeId;
    fn clone_object(&self) -> Box<dyn DomainObject>;
    fn eq_object(&self, other: &dyn DomainObject) -> bool;
}

impl<T> DomainObject for T
where
    T: Any + Clone + PartialEq + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn object_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn clone_object(&self) -> Box<dyn DomainObject> {
        Box::new(self.clone())
    }

    fn eq_object(&self, other: &dyn DomainObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// An owned, type-erased domain object held inside an [`ObjectValue`].
pub struct BoxedObject(Box<dyn DomainObject>);

impl BoxedObject {
    pub fn new<T: DomainObject>(object: T) -> Self {
        Self(Box::new(object))
    }

    pub fn from_box(object: Box<dyn DomainObject>) -> Self {
        Self(object)
    }

    /// Borrows the erased object.
    pub fn get(&self) -> &dyn DomainObject {
        self.0.as_ref()
    }

    pub fn type_id_of(&self) -> TypeId {
        self.0.object_type_id()
    }

    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Unwraps into the concrete type.
    pub fn downcast<T: DomainObject>(self) -> Result<T, DbError> {
        let any = self.0.into_any();
        any.downcast::<T>().map(|b| *b).map_err(|_| {
            DbError::mapping(format!(
                "object is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn into_box(self) -> Box<dyn DomainObject> {
        self.0
    }
}

impl Clone for BoxedObject {
    fn clone(&self) -> Self {
        Self(self.0.clone_object())
    }
}

impl PartialEq for BoxedObject {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_object(other.0.as_ref())
    }
}

impl fmt::Debug for BoxedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_ref(), f)
    }
}

/// A property value as read from or written to a domain object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Null,
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    Decimal(Decimal),
    Bool(bool),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Instant(DateTime<Utc>),
    Point(GeoPoint),
    Polygon(GeoPolygon),
    /// Enum variant name
    Enum(String),
    /// Key/value pairs in insertion order. Only string and enum keys are
    /// persistable.
    Map(Vec<(ObjectValue, ObjectValue)>),
    /// Store value passed through untouched
    Native(FieldValue),
    List(Vec<ObjectValue>),
    Object(BoxedObject),
}

impl ObjectValue {
    /// Wraps a domain object.
    pub fn object<T: DomainObject>(object: T) -> Self {
        ObjectValue::Object(BoxedObject::new(object))
    }

    /// Builds a list from convertible items.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ObjectValue>,
    {
        ObjectValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds a string-keyed map from convertible entries.
    pub fn string_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ObjectValue>,
    {
        ObjectValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (ObjectValue::String(k.into()), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ObjectValue::Null)
    }

    /// Short variant name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectValue::Null => "null",
            ObjectValue::String(_) => "string",
            ObjectValue::Int(_) => "int",
            ObjectValue::Long(_) => "long",
            ObjectValue::Float(_) => "float",
            ObjectValue::Double(_) => "double",
            ObjectValue::BigInteger(_) => "big_integer",
            ObjectValue::Decimal(_) => "big_decimal",
            ObjectValue::Bool(_) => "bool",
            ObjectValue::Bytes(_) => "bytes",
            ObjectValue::Date(_) => "date",
            ObjectValue::Timestamp(_) => "timestamp",
            ObjectValue::Instant(_) => "instant",
            ObjectValue::Point(_) => "geo_point",
            ObjectValue::Polygon(_) => "geo_polygon",
            ObjectValue::Enum(_) => "enum",
            ObjectValue::Map(_) => "map",
            ObjectValue::Native(_) => "native",
            ObjectValue::List(_) => "list",
            ObjectValue::Object(_) => "object",
        }
    }

    /// Converts into a concrete Rust value.
    pub fn take<T: FromObjectValue>(self) -> Result<T, DbError> {
        T::from_object_value(self)
    }

    /// Unwraps a nested domain object of type `T`.
    pub fn into_object<T: DomainObject>(self) -> Result<T, DbError> {
        match self {
            ObjectValue::Object(boxed) => boxed.downcast::<T>(),
            other => Err(mismatch(std::any::type_name::<T>(), &other)),
        }
    }

    /// Like [`into_object`](Self::into_object) but maps `Null` to `None`.
    pub fn into_optional_object<T: DomainObject>(self) -> Result<Option<T>, DbError> {
        match self {
            ObjectValue::Null => Ok(None),
            other => other.into_object().map(Some),
        }
    }

    /// Unwraps a byte blob.
    pub fn into_bytes(self) -> Result<Vec<u8>, DbError> {
        match self {
            ObjectValue::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }

    /// Converts each list element.
    pub fn into_list_of<T, F>(self, mut convert: F) -> Result<Vec<T>, DbError>
    where
        F: FnMut(ObjectValue) -> Result<T, DbError>,
    {
        match self {
            ObjectValue::List(items) => items.into_iter().map(&mut convert).collect(),
            ObjectValue::Null => Ok(Vec::new()),
            other => Err(mismatch("list", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &ObjectValue) -> DbError {
    DbError::mapping(format!(
        "expected {} value, got {}",
        expected,
        got.kind_name()
    ))
}

/// Conversion from a property value into a concrete field type; used by
/// property setters.
pub trait FromObjectValue: Sized {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError>;
}

impl FromObjectValue for ObjectValue {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        Ok(value)
    }
}

impl FromObjectValue for String {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::String(s) | ObjectValue::Enum(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromObjectValue for i32 {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Int(v) => Ok(v),
            ObjectValue::Long(v) => i32::try_from(v)
                .map_err(|_| DbError::mapping(format!("{} does not fit in int", v))),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromObjectValue for i64 {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Int(v) => Ok(i64::from(v)),
            ObjectValue::Long(v) => Ok(v),
            other => Err(mismatch("long", &other)),
        }
    }
}

impl FromObjectValue for f32 {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Float(v) => Ok(v),
            ObjectValue::Double(v) => Ok(v as f32),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromObjectValue for f64 {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Float(v) => Ok(f64::from(v)),
            ObjectValue::Double(v) => Ok(v),
            ObjectValue::Int(v) => Ok(f64::from(v)),
            ObjectValue::Long(v) => Ok(v as f64),
            other => Err(mismatch("double", &other)),
        }
    }
}

impl FromObjectValue for bool {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromObjectValue for BigInt {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::BigInteger(v) => Ok(v),
            ObjectValue::Int(v) => Ok(BigInt::from(v)),
            ObjectValue::Long(v) => Ok(BigInt::from(v)),
            other => Err(mismatch("big_integer", &other)),
        }
    }
}

impl FromObjectValue for Decimal {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Decimal(v) => Ok(v),
            ObjectValue::Int(v) => Ok(Decimal::from(v)),
            ObjectValue::Long(v) => Ok(Decimal::from(v)),
            other => Err(mismatch("big_decimal", &other)),
        }
    }
}

impl FromObjectValue for NaiveDate {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Date(v) => Ok(v),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl FromObjectValue for NaiveDateTime {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Timestamp(v) => Ok(v),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl FromObjectValue for DateTime<Utc> {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Instant(v) => Ok(v),
            other => Err(mismatch("instant", &other)),
        }
    }
}

impl FromObjectValue for GeoPoint {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Point(v) => Ok(v),
            other => Err(mismatch("geo_point", &other)),
        }
    }
}

impl FromObjectValue for GeoPolygon {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Polygon(v) => Ok(v),
            other => Err(mismatch("geo_polygon", &other)),
        }
    }
}

impl FromObjectValue for FieldValue {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Native(v) => Ok(v),
            ObjectValue::Null => Ok(FieldValue::Null),
            other => Err(mismatch("native", &other)),
        }
    }
}

impl<T: FromObjectValue> FromObjectValue for Option<T> {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        match value {
            ObjectValue::Null => Ok(None),
            other => T::from_object_value(other).map(Some),
        }
    }
}

impl<T: FromObjectValue> FromObjectValue for Vec<T> {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        value.into_list_of(T::from_object_value)
    }
}

fn string_keyed<T: FromObjectValue>(value: ObjectValue) -> Result<Vec<(String, T)>, DbError> {
    match value {
        ObjectValue::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((String::from_object_value(k)?, T::from_object_value(v)?)))
            .collect(),
        ObjectValue::Null => Ok(Vec::new()),
        other => Err(mismatch("map", &other)),
    }
}

impl<T: FromObjectValue> FromObjectValue for BTreeMap<String, T> {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        Ok(string_keyed(value)?.into_iter().collect())
    }
}

impl<T: FromObjectValue> FromObjectValue for HashMap<String, T> {
    fn from_object_value(value: ObjectValue) -> Result<Self, DbError> {
        Ok(string_keyed(value)?.into_iter().collect())
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ObjectValue {
                fn from(value: $ty) -> Self {
                    ObjectValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    String => String,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    BigInt => BigInteger,
    Decimal => Decimal,
    bool => Bool,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => Instant,
    GeoPoint => Point,
    GeoPolygon => Polygon,
    FieldValue => Native,
}

impl From<&str> for ObjectValue {
    fn from(value: &str) -> Self {
        ObjectValue::String(value.to_string())
    }
}

impl<T: Into<ObjectValue>> From<Option<T>> for ObjectValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ObjectValue::Null, Into::into)
    }
}
