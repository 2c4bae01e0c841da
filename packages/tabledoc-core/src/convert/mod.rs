//! Conversion between domain objects and hybrid rows.
//!
//! A row holds one typed value per primary key column and a document tree
//! under [`DOCUMENT_COLUMN`](crate::mapping::DOCUMENT_COLUMN) for every other
//! persisted property.

mod read;
mod row;
mod sql_type;
mod write;

pub use row::Row;
pub use sql_type::sql_type_of;
pub(crate) use write::key_value;

use crate::mapping::MappingContext;

/// Key naming the registered type of a polymorphic nested object.
pub const TYPE_DISCRIMINATOR: &str = "#type";

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Converts objects to rows and back using the metadata of a context.
#[derive(Debug, Clone, Copy)]
pub struct RowConverter<'a> {
    context: &'a MappingContext,
}

impl<'a> RowConverter<'a> {
    pub fn new(context: &'a MappingContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a MappingContext {
        self.context
    }
}
