//! Mapping and store error types.

use thiserror::Error;

use crate::store::{StoreError, StoreErrorCode};

/// Coarse classification of a [`DbError`].
///
/// Callers branch on the kind instead of on individual variants: only
/// `Transient` failures are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unmappable type, bad key layout, schema mismatch, invalid query.
    Configuration,
    /// Timeout, throttling, retryable network condition.
    Transient,
    /// Authorization failure, missing or existing resource, unsupported op.
    Permanent,
    /// Table, row, key or batch size limits.
    Limit,
    /// A store code this layer does not recognize.
    Unclassified,
}

/// Errors raised by the mapping layer and by the store boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    /// A declared or runtime type that has no mapping
    #[error("Unsupported type '{type_name}': {reason}")]
    UnsupportedType { type_name: String, reason: String },

    /// Map key that is neither a string nor an enum name
    #[error("Unsupported map key type {key_type} in property '{property}': only string and enum keys are allowed")]
    UnsupportedMapKey { property: String, key_type: String },

    /// Entity without id property, or id value missing on write
    #[error("Missing id for entity '{entity}'")]
    MissingId { entity: String },

    /// Composite key misconfiguration
    #[error("Invalid composite key for entity '{entity}': {reason}")]
    InvalidCompositeKey { entity: String, reason: String },

    /// Key column collides with the reserved document column
    #[error("Column '{column}' of entity '{entity}' collides with the reserved document column")]
    ReservedColumnName { entity: String, column: String },

    /// Type name or Rust type never registered
    #[error("Type '{0}' is not registered")]
    UnregisteredType(String),

    /// Type name registered twice
    #[error("Type '{0}' already registered")]
    TypeAlreadyRegistered(String),

    /// Property path that does not resolve on an entity
    #[error("Property '{property}' not found on entity '{entity}'")]
    UnknownProperty { entity: String, property: String },

    /// Value conversion failure
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Existing table does not match the entity; lists every discrepancy
    #[error("Schema of table '{table}' does not match entity: {}", .mismatches.join("; "))]
    SchemaMismatch {
        table: String,
        mismatches: Vec<String>,
    },

    /// Query could not be compiled
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Update of a row that does not exist
    #[error("Row not present in table '{table}'")]
    RowNotPresent { table: String },

    /// Retryable store failure
    #[error("Transient store error: {0}")]
    Transient(StoreError),

    /// Non-retryable store failure
    #[error("Store error: {0}")]
    Permanent(StoreError),

    /// Store capacity or size limit
    #[error("Store limit exceeded: {0}")]
    LimitExceeded(StoreError),

    /// Store failure passed through unmodified
    #[error("Unclassified store error: {0}")]
    Store(StoreError),
}

impl DbError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Transient(_) => ErrorKind::Transient,
            DbError::Permanent(_) | DbError::RowNotPresent { .. } => ErrorKind::Permanent,
            DbError::LimitExceeded(_) => ErrorKind::Limit,
            DbError::Store(_) => ErrorKind::Unclassified,
            _ => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if the caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            DbError::Transient(e)
            | DbError::Permanent(e)
            | DbError::LimitExceeded(e)
            | DbError::Store(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        DbError::Mapping(message.into())
    }

    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        DbError::InvalidQuery(message.into())
    }
}

impl From<StoreError> for DbError {
    fn from(error: StoreError) -> Self {
        match error.code {
            StoreErrorCode::RequestTimeout
            | StoreErrorCode::ReadLimitExceeded
            | StoreErrorCode::WriteLimitExceeded
            | StoreErrorCode::OperationLimitExceeded
            | StoreErrorCode::NetworkRetryable
            | StoreErrorCode::ServiceUnavailable => DbError::Transient(error),

            StoreErrorCode::Unauthorized
            | StoreErrorCode::TableNotFound
            | StoreErrorCode::IndexNotFound
            | StoreErrorCode::TableExists
            | StoreErrorCode::IndexExists
            | StoreErrorCode::OperationNotSupported
            | StoreErrorCode::IllegalArgument
            | StoreErrorCode::PreparedStatementInvalid => DbError::Permanent(error),

            StoreErrorCode::TableLimitExceeded
            | StoreErrorCode::RowSizeLimitExceeded
            | StoreErrorCode::KeySizeLimitExceeded
            | StoreErrorCode::BatchOperationLimitExceeded
            | StoreErrorCode::RequestSizeLimitExceeded => DbError::LimitExceeded(error),

            StoreErrorCode::Other(code) => {
                tracing::warn!("Passing through unrecognized store error code {}: {}", code, error);
                DbError::Store(error)
            }
        }
    }
}
