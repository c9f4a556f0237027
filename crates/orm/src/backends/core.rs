//! Core Connection Trait
//!
//! [`Connection`] is the capability set every backend implements. Calls are
//! blocking; a connection is owned by one thread at a time (`Send`, not
//! `Sync`).

use std::fmt;

use tracing::debug;

use super::result::ResultSet;
use super::BackendType;
use crate::error::{OrmError, OrmResult};
use crate::query::PreparedStatement;

/// Abstract database connection
pub trait Connection: Send {
    /// Run a statement that returns rows
    fn query(&mut self, sql: &str) -> OrmResult<ResultSet>;

    /// Run a statement and return the affected row count
    fn exec(&mut self, sql: &str) -> OrmResult<u64>;

    /// Open a transaction; fails with `TransactionAlreadyActive` when one is
    /// already open
    fn begin_transaction(&mut self) -> OrmResult<()>;

    /// Fails with `TransactionNotActive` outside a transaction
    fn commit(&mut self) -> OrmResult<()>;

    /// Fails with `TransactionNotActive` outside a transaction
    fn rollback(&mut self) -> OrmResult<()>;

    /// Id generated by the most recent INSERT on this connection
    fn last_insert_id(&self) -> u64;

    /// Release the backend handle; later calls fail with `NotConnected`
    fn close(&mut self) -> OrmResult<()>;

    fn in_transaction(&self) -> bool;

    fn backend_type(&self) -> BackendType;

    fn is_connected(&self) -> bool;

    /// Round-trip check used by the pool before reusing a connection
    fn ping(&mut self) -> OrmResult<()> {
        self.query("SELECT 1").map(|_| ())
    }

    /// Run a prepared SELECT; backends without native binding get the
    /// executable text
    fn query_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<ResultSet> {
        self.query(&stmt.to_executable_sql())
    }

    /// Run a prepared write statement
    fn exec_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<u64> {
        self.exec(&stmt.to_executable_sql())
    }
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend_type())
            .field("connected", &self.is_connected())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// `idle -> in_transaction -> idle` bookkeeping shared by the backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    InTransaction,
}

impl TransactionState {
    /// Check a `begin_transaction` is allowed
    pub fn ensure_can_begin(&self) -> OrmResult<()> {
        match self {
            TransactionState::Idle => Ok(()),
            TransactionState::InTransaction => Err(OrmError::TransactionAlreadyActive),
        }
    }

    /// Check a `commit`/`rollback` is allowed
    pub fn ensure_active(&self) -> OrmResult<()> {
        match self {
            TransactionState::InTransaction => Ok(()),
            TransactionState::Idle => Err(OrmError::TransactionNotActive),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::InTransaction)
    }
}

/// Statement log line shared by every backend
pub(crate) fn log_statement(backend: BackendType, sql: &str) {
    debug!(target: "strata_orm::sql", %backend, sql);
}
