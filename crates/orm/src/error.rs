//! Error types for the database layer
//!
//! Every fallible operation in this crate returns [`OrmResult`]. Backend
//! errors surface unchanged in meaning: nothing here retries or swallows a
//! failure, and row absence is reported as `Ok(None)` rather than an error.

use thiserror::Error;

/// Result type alias for database operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for connection, query and model operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrmError {
    /// The backend could not be opened or reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed SQL or a backend-reported execution error
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// `commit`/`rollback` called while no transaction is open
    #[error("No transaction is active")]
    TransactionNotActive,

    /// `begin_transaction` called while a transaction is already open
    #[error("A transaction is already active; nested transactions are not supported")]
    TransactionAlreadyActive,

    /// The connection was closed or never established
    #[error("Not connected")]
    NotConnected,

    /// `find_or_fail` (or a keyed lookup) matched no row
    #[error("Record not found in table '{table}' for key {key}")]
    ModelNotFound { table: String, key: String },

    /// The INSERT ran but the new row could not be materialized
    #[error("Create failed: {0}")]
    CreateFailed(String),

    /// The UPDATE could not be built or executed
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// The model or row carries no usable primary key
    #[error("Primary key '{0}' not found")]
    PrimaryKeyNotFound(String),

    /// A pre-event observer vetoed the operation
    #[error("Operation cancelled by '{event}' observer on {model}")]
    Cancelled { model: String, event: String },

    /// Every pooled connection is checked out
    #[error("Pool exhausted: all {max_connections} connections in use")]
    PoolExhausted { max_connections: u32 },

    /// No pooled connection became available in time
    #[error("Timed out after {timeout}s waiting for a pooled connection")]
    PoolTimeout { timeout: u64 },

    /// The builder was asked to render something it cannot express
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Driver configuration or URL could not be understood
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OrmError {
    /// True when the error reports a missing row rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrmError::ModelNotFound { .. })
    }

    /// True for transaction state machine violations
    pub fn is_transaction_error(&self) -> bool {
        matches!(
            self,
            OrmError::TransactionNotActive | OrmError::TransactionAlreadyActive
        )
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        OrmError::QueryFailed(err.to_string())
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::QueryFailed(err.to_string())
    }
}

impl From<url::ParseError> for OrmError {
    fn from(err: url::ParseError) -> Self {
        OrmError::Configuration(err.to_string())
    }
}
