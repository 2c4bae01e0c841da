//! Object mapping for a hybrid key-column / JSON-document table store.
//!
//! Entities are stored as one row per object: primary key components in
//! typed columns and every other property in a single JSON document column.
//! Queries are derived from method names or written as literal text, compiled
//! to parameterized statements and executed through a prepared-query cache.

pub mod cache;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod mapping;
pub mod query;
pub mod schema;
pub mod store;
pub mod template;
pub mod types;

pub use cache::PreparedQueryCache;
pub use config::MapperConfig;
pub use convert::{Row, RowConverter};
pub use dispatch::{Execution, Page, QueryDispatcher, ResultShape, Slice};
pub use error::{DbError, ErrorKind};
pub use mapping::{EntityDescriptor, MappingContext, TableOptions, TypeInfo, TypeRegistry};
pub use store::{StoreClient, StoreError, StoreErrorCode};
pub use template::TableTemplate;
pub use types::{DomainObject, FieldType, FieldValue, ObjectValue};
