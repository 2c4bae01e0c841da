//! Mapping metadata: property tables, the type registry, and the entity
//! descriptors derived from them.

mod context;
mod entity;
mod options;
mod property;
mod registry;
mod type_info;

pub use context::MappingContext;
pub use entity::{EntityDescriptor, IdGeneration, KeyColumn, ResolvedPath, DOCUMENT_COLUMN};
pub use options::{CapacityMode, Consistency, Durability, TableOptions, Ttl, TtlUnit};
pub use property::PropertyDescriptor;
pub use registry::TypeRegistry;
pub use type_info::{
    Factory, Getter, KeyAnnotation, PropertyDecl, PropertyInfo, Setter, TypeDefinition,
    TypeInfo, TypeInfoBuilder,
};
