//! Database handle
//!
//! [`Database`] owns one backend connection, the pool it came from and the
//! per-model observer registry. It is passed explicitly to every model
//! operation; nothing in the crate looks it up from global state.

use tracing::{debug, info, warn};

use crate::backends::{BackendType, Connection, DriverConfig, ResultSet};
use crate::connection::{ConnectionPool, PoolConfig, PoolStats};
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::observers::{ModelObserver, ObserverManager};
use crate::query::PreparedStatement;
use crate::transaction::TransactionGuard;

pub struct Database {
    conn: Option<Box<dyn Connection>>,
    pool: ConnectionPool,
    observers: ObserverManager,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("conn", &self.conn)
            .field("pool", &self.pool)
            .field("observers", &self.observers)
            .finish()
    }
}

impl Database {
    /// Open a database for `config`, pool sizing seeded from the driver
    /// settings
    pub fn connect(config: &DriverConfig) -> OrmResult<Self> {
        let pool = ConnectionPool::for_driver(config.clone(), PoolConfig::from(config));
        Self::with_pool(pool)
    }

    /// Shorthand for [`DriverConfig::from_url`] + [`connect`](Self::connect)
    pub fn connect_url(url: &str) -> OrmResult<Self> {
        Self::connect(&DriverConfig::from_url(url)?)
    }

    /// Take the working connection from `pool`
    pub fn with_pool(pool: ConnectionPool) -> OrmResult<Self> {
        let conn = pool.acquire()?;
        info!(backend = %conn.backend_type(), "database ready");
        Ok(Self {
            conn: Some(conn),
            pool,
            observers: ObserverManager::new(),
        })
    }

    /// Wrap an already-open connection
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            conn: Some(conn),
            pool: ConnectionPool::detached(PoolConfig::default()),
            observers: ObserverManager::new(),
        }
    }

    pub fn connection(&mut self) -> OrmResult<&mut dyn Connection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(OrmError::NotConnected),
        }
    }

    pub fn query(&mut self, sql: &str) -> OrmResult<ResultSet> {
        self.connection()?.query(sql)
    }

    pub fn exec(&mut self, sql: &str) -> OrmResult<u64> {
        self.connection()?.exec(sql)
    }

    pub fn query_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<ResultSet> {
        debug!(statement = %stmt.debug(), "query_prepared");
        self.connection()?.query_prepared(stmt)
    }

    pub fn exec_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<u64> {
        debug!(statement = %stmt.debug(), "exec_prepared");
        self.connection()?.exec_prepared(stmt)
    }

    pub fn begin_transaction(&mut self) -> OrmResult<()> {
        self.connection()?.begin_transaction()
    }

    pub fn commit(&mut self) -> OrmResult<()> {
        self.connection()?.commit()
    }

    pub fn rollback(&mut self) -> OrmResult<()> {
        self.connection()?.rollback()
    }

    pub fn last_insert_id(&self) -> u64 {
        self.conn.as_ref().map_or(0, |conn| conn.last_insert_id())
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.in_transaction())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| conn.is_connected())
    }

    pub fn backend_type(&self) -> Option<BackendType> {
        self.conn.as_ref().map(|conn| conn.backend_type())
    }

    /// Close the working connection and the pool; later calls fail with
    /// `NotConnected`
    pub fn close(&mut self) -> OrmResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let result = conn.close();
        self.pool.release(conn);
        self.pool.close();
        info!("database closed");
        result
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back and return
    /// the error on `Err`
    ///
    /// Transactions do not nest; starting one inside `f` fails with
    /// `TransactionAlreadyActive`.
    pub fn transaction<T, F>(&mut self, f: F) -> OrmResult<T>
    where
        F: FnOnce(&mut Database) -> OrmResult<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                if self.in_transaction() {
                    self.commit()?;
                }
                Ok(value)
            }
            Err(e) => {
                if self.in_transaction() {
                    if let Err(rollback_err) = self.rollback() {
                        warn!("Rollback after failed transaction also failed: {}", rollback_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Begin a transaction that rolls back unless committed
    pub fn begin(&mut self) -> OrmResult<TransactionGuard<'_>> {
        TransactionGuard::begin(self)
    }

    pub fn observers(&self) -> &ObserverManager {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverManager {
        &mut self.observers
    }

    /// The observer for model `M`, created on first use
    pub fn observe<M: Model>(&mut self) -> &mut ModelObserver<M> {
        self.observers.observe::<M>(M::model_name())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{EmbeddedConfig, MemoryConnection};

    fn memory() -> (Database, crate::backends::MemoryHandle) {
        let conn = MemoryConnection::new();
        let handle = conn.handle();
        (Database::new(Box::new(conn)), handle)
    }

    #[test]
    fn test_connect_memory_driver() {
        let mut db = Database::connect(&DriverConfig::Memory).unwrap();
        assert_eq!(db.backend_type(), Some(BackendType::Memory));
        assert_eq!(db.exec("INSERT INTO t (a) VALUES (1)").unwrap(), 1);
        assert_eq!(db.last_insert_id(), 1);

        let stats = db.pool_stats();
        assert_eq!(stats.acquires, 1);
        assert_eq!(stats.creates, 1);
    }

    #[test]
    fn test_close_releases_connection() {
        let mut db = Database::connect_url("sqlite::memory:").unwrap();
        db.exec("CREATE TABLE t (a INTEGER)").unwrap();
        db.close().unwrap();

        assert!(!db.is_connected());
        assert_eq!(db.query("SELECT 1").unwrap_err(), OrmError::NotConnected);
        assert_eq!(db.pool_stats().releases, 1);
        assert!(db.close().is_ok());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let (mut db, handle) = memory();
        let id = db
            .transaction(|db| {
                db.exec("INSERT INTO users (name) VALUES ('a')")?;
                Ok(db.last_insert_id())
            })
            .unwrap();

        assert_eq!(id, 1);
        assert!(!db.in_transaction());
        assert_eq!(handle.transactions_committed(), 1);
        assert_eq!(handle.insert_count(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let (mut db, handle) = memory();
        let result: OrmResult<()> = db.transaction(|db| {
            db.exec("INSERT INTO users (name) VALUES ('a')")?;
            Err(OrmError::QueryFailed("boom".to_string()))
        });

        assert_eq!(result, Err(OrmError::QueryFailed("boom".to_string())));
        assert!(!db.in_transaction());
        assert_eq!(handle.transactions_rolled_back(), 1);
        assert_eq!(handle.insert_count(), 0);
        assert!(handle.committed_writes().is_empty());
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let (mut db, _) = memory();
        let result = db.transaction(|db| db.transaction(|_| Ok(())));
        assert_eq!(result, Err(OrmError::TransactionAlreadyActive));
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_commit_outside_transaction() {
        let (mut db, _) = memory();
        assert_eq!(db.commit(), Err(OrmError::TransactionNotActive));
        assert_eq!(db.rollback(), Err(OrmError::TransactionNotActive));
    }

    #[test]
    fn test_embedded_transaction_atomicity() {
        let mut db = Database::connect(&DriverConfig::Embedded(EmbeddedConfig::default())).unwrap();
        db.exec("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
        db.exec("INSERT INTO items (name) VALUES ('kept')").unwrap();

        let result: OrmResult<()> = db.transaction(|db| {
            db.exec("INSERT INTO items (name) VALUES ('dropped')")?;
            db.exec("INSERT INTO missing_table (x) VALUES (1)")?;
            Ok(())
        });
        assert!(matches!(result, Err(OrmError::QueryFailed(_))));

        let count = db.query("SELECT COUNT(*) FROM items").unwrap();
        assert_eq!(count.scalar::<i64>(), Some(1));
    }
}
