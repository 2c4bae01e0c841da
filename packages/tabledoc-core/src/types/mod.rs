//! Type system: declared field types, runtime values, store values, and
//! the classification that connects them.

mod field_type;
mod field_value;
mod geo;
mod type_code;
mod value;

pub use field_type::FieldType;
pub use field_value::FieldValue;
pub use geo::{GeoPoint, GeoPolygon};
pub use type_code::{classify_for_read, classify_for_write, TypeCode};
pub use value::{BoxedObject, DomainObject, FromObjectValue, ObjectValue};
