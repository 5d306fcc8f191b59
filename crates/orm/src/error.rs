//! Error types for the ORM
//!
//! One central error enum covers database operations, query building,
//! relationships, and transaction management. Precondition violations
//! (missing table, missing primary key, transaction misuse) get their own
//! variants so callers can distinguish them from driver failures.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Database connection or query error, propagated from the driver
    Database(String),
    /// Record not found (used by `find_or_fail` / `first_or_fail`)
    NotFound(String),
    /// Query compiled without a table being set
    MissingTable,
    /// Primary key is missing or invalid for an update/delete
    MissingPrimaryKey,
    /// Relationship resolution failed
    Relationship(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Connection pool error
    Connection(String),
    /// Transaction error
    Transaction(String),
    /// Manual `begin` while a transaction is already active
    TransactionActive,
    /// Manual `commit`/`rollback` with no active transaction
    NoActiveTransaction,
    /// Query building error
    Query(String),
    /// Configuration error
    Configuration(String),
    /// Operation has no meaning on this backend (e.g. raw SQL on the
    /// document store, count subqueries on MorphTo)
    UnsupportedOperation(String),
    /// Cache collaborator failure
    Cache(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(msg) => write!(f, "Record not found: {}", msg),
            ModelError::MissingTable => write!(f, "No table set on query builder"),
            ModelError::MissingPrimaryKey => write!(f, "Primary key is missing or invalid"),
            ModelError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::TransactionActive => write!(f, "A transaction is already active"),
            ModelError::NoActiveTransaction => write!(f, "No active transaction"),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            ModelError::Cache(msg) => write!(f, "Cache error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_have_stable_messages() {
        assert_eq!(
            ModelError::MissingTable.to_string(),
            "No table set on query builder"
        );
        assert_eq!(
            ModelError::TransactionActive.to_string(),
            "A transaction is already active"
        );
        assert_eq!(
            ModelError::NoActiveTransaction.to_string(),
            "No active transaction"
        );
    }

    #[test]
    fn driver_errors_wrap_with_context() {
        let err: ModelError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ModelError::Serialization(_)));
    }
}
