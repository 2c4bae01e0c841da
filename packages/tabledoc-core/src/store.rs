//! The store boundary.
//!
//! [`StoreClient`] is the synchronous surface of the table store's wire
//! client. Its failures arrive as [`StoreError`] and are mapped into
//! [`DbError`](crate::error::DbError) by the callers in this crate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::convert::Row;
use crate::mapping::{CapacityMode, Consistency, Durability, Ttl};
use crate::schema::TableSchema;
use crate::types::FieldValue;

/// Error codes reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorCode {
    RequestTimeout,
    ReadLimitExceeded,
    WriteLimitExceeded,
    OperationLimitExceeded,
    NetworkRetryable,
    ServiceUnavailable,
    Unauthorized,
    TableNotFound,
    IndexNotFound,
    TableExists,
    IndexExists,
    OperationNotSupported,
    IllegalArgument,
    /// The compiled form of a prepared statement no longer matches the table
    PreparedStatementInvalid,
    TableLimitExceeded,
    RowSizeLimitExceeded,
    KeySizeLimitExceeded,
    BatchOperationLimitExceeded,
    RequestSizeLimitExceeded,
    /// A code this crate does not know
    Other(i32),
}

/// A failure reported by the store.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code:?}: {message}")]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A store-compiled query plus its variable bindings.
///
/// The compiled form is shared between copies; bindings are private to
/// each copy.
#[derive(Clone)]
pub struct PreparedStatement {
    text: Arc<str>,
    compiled: Arc<[u8]>,
    bindings: BTreeMap<String, FieldValue>,
}

impl PreparedStatement {
    /// Wraps the compiled form issued by the store for `text`.
    pub fn new(text: impl Into<Arc<str>>, compiled: impl Into<Arc<[u8]>>) -> Self {
        Self {
            text: text.into(),
            compiled: compiled.into(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn compiled(&self) -> &[u8] {
        &self.compiled
    }

    /// Binds a variable, adding the `$` prefix when missing.
    pub fn set_variable(&mut self, name: &str, value: FieldValue) {
        let name = if name.starts_with('$') {
            name.to_string()
        } else {
            format!("${}", name)
        };
        self.bindings.insert(name, value);
    }

    pub fn bindings(&self) -> &BTreeMap<String, FieldValue> {
        &self.bindings
    }

    /// Returns a copy sharing the compiled form, with no bindings.
    pub fn fresh_copy(&self) -> Self {
        Self {
            text: Arc::clone(&self.text),
            compiled: Arc::clone(&self.compiled),
            bindings: BTreeMap::new(),
        }
    }

    /// Returns `true` if both handles share one compiled form.
    pub fn shares_compilation_with(&self, other: &PreparedStatement) -> bool {
        Arc::ptr_eq(&self.compiled, &other.compiled)
    }
}

impl fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("text", &self.text)
            .field("compiled_len", &self.compiled.len())
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Point read by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub table: String,
    pub key: Row,
    pub consistency: Consistency,
    pub timeout: Duration,
}

/// Row write.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub table: String,
    pub row: Row,
    /// Only overwrite an existing row
    pub if_present_only: bool,
    /// Key column the store must fill in when absent from `row`
    pub generated_column: Option<String>,
    pub ttl: Option<Ttl>,
    pub durability: Durability,
    pub timeout: Duration,
}

/// Outcome of a put.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutResult {
    pub success: bool,
    /// Value generated for `generated_column`
    pub generated: Option<FieldValue>,
}

/// Point delete by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table: String,
    pub key: Row,
    pub durability: Durability,
    pub timeout: Duration,
}

/// Delete of every row sharing a complete shard key.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiDeleteRequest {
    pub table: String,
    pub shard_key: Row,
    pub durability: Durability,
    pub timeout: Duration,
}

/// One batch of a prepared query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub statement: PreparedStatement,
    /// Continuation returned by the previous batch
    pub continuation: Option<String>,
    pub consistency: Consistency,
    pub durability: Durability,
    pub timeout: Duration,
}

/// One batch of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Present when more batches follow
    pub continuation: Option<String>,
}

/// A DDL statement with the limits of a table it creates.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRequest {
    pub statement: String,
    pub limits: Option<CapacityMode>,
    pub timeout: Duration,
}

/// Synchronous client of the table store.
pub trait StoreClient: Send + Sync {
    /// Reads one row by its complete primary key.
    fn get(&self, request: &GetRequest) -> Result<Option<Row>, StoreError>;

    /// Writes one row.
    fn put(&self, request: &PutRequest) -> Result<PutResult, StoreError>;

    /// Deletes one row; returns `true` if it existed.
    fn delete(&self, request: &DeleteRequest) -> Result<bool, StoreError>;

    /// Deletes every row of a shard; returns the number deleted.
    fn multi_delete(&self, request: &MultiDeleteRequest) -> Result<u64, StoreError>;

    /// Compiles a query statement.
    fn prepare(&self, statement: &str) -> Result<PreparedStatement, StoreError>;

    /// Runs one batch of a prepared query.
    fn query(&self, request: &QueryRequest) -> Result<QueryResult, StoreError>;

    /// Executes a DDL statement and waits for completion.
    fn table_ddl(&self, request: &TableRequest) -> Result<(), StoreError>;

    /// Describes a table, or `None` if it does not exist.
    fn get_table(&self, table: &str) -> Result<Option<TableSchema>, StoreError>;
}
