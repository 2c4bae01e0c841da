//! Table schema: DDL derivation, discovered table descriptions, validation
//! and table lifecycle.

mod ddl;
mod manager;
mod table_schema;
mod validation;

pub use ddl::{create_table_ddl, drop_table_ddl};
pub use manager::SchemaManager;
pub use table_schema::{ColumnSchema, IdentitySchema, TableSchema};
pub use validation::{ensure_matches, validate_existing};
