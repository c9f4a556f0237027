//! Native-protocol backend on sqlx's MySQL client
//!
//! The connection owns a current-thread tokio runtime and blocks on every
//! call, so callers see a synchronous API. Statements go over the text
//! protocol, which hands every cell back as text or NULL.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection as SqlxConnection, Executor, Row as SqlxRow};
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use super::config::NativeConfig;
use super::core::{log_statement, Connection, TransactionState};
use super::result::ResultSet;
use super::BackendType;
use crate::error::{OrmError, OrmResult};

/// Why a blocking call did not produce a value
#[derive(Debug)]
enum Failure {
    Driver(sqlx::Error),
    Timeout(u64),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Driver(e) => write!(f, "{}", e),
            Failure::Timeout(secs) => write!(f, "timed out after {}s", secs),
        }
    }
}

impl Failure {
    /// True when the socket can no longer be trusted
    fn breaks_connection(&self) -> bool {
        match self {
            Failure::Timeout(_) => true,
            Failure::Driver(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

/// Drive `fut` to completion; a zero timeout waits forever
fn block_on_timeout<T, F>(runtime: &Runtime, secs: u64, fut: F) -> Result<T, Failure>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    runtime.block_on(async {
        if secs == 0 {
            return fut.await.map_err(Failure::Driver);
        }
        match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(result) => result.map_err(Failure::Driver),
            Err(_) => Err(Failure::Timeout(secs)),
        }
    })
}

fn connect_options(config: &NativeConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .charset(&config.charset);
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if !config.database.is_empty() {
        options = options.database(&config.database);
    }
    options
}

fn open(runtime: &Runtime, config: &NativeConfig) -> OrmResult<MySqlConnection> {
    let options = connect_options(config);
    block_on_timeout(
        runtime,
        config.connect_timeout,
        MySqlConnection::connect_with(&options),
    )
    .map_err(|failure| {
        error!(
            host = %config.host,
            port = config.port,
            error = %failure,
            "native connection failed"
        );
        OrmError::ConnectionFailed(format!("{}:{}: {}", config.host, config.port, failure))
    })
}

fn to_result_set(rows: Vec<MySqlRow>) -> ResultSet {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let mut set = ResultSet::new(columns);
    for row in &rows {
        let values = (0..row.len())
            .map(|i| {
                row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                    .ok()
                    .flatten()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            })
            .collect();
        set.push_row(values);
    }
    set
}

/// MySQL-backed [`Connection`]
pub struct NativeConnection {
    config: NativeConfig,
    runtime: Runtime,
    conn: Option<MySqlConnection>,
    transaction: TransactionState,
    last_insert_id: u64,
    broken: bool,
}

impl fmt::Debug for NativeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("connected", &self.conn.is_some())
            .field("transaction", &self.transaction)
            .field("broken", &self.broken)
            .finish()
    }
}

impl NativeConnection {
    /// Open a connection, honouring `connect_timeout`
    pub fn connect(config: NativeConfig) -> OrmResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| OrmError::ConnectionFailed(format!("failed to start I/O runtime: {}", e)))?;
        let conn = open(&runtime, &config)?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "native connection established"
        );

        Ok(Self {
            config,
            runtime,
            conn: Some(conn),
            transaction: TransactionState::Idle,
            last_insert_id: 0,
            broken: false,
        })
    }

    pub fn config(&self) -> &NativeConfig {
        &self.config
    }

    fn log(&self, sql: &str) {
        if self.config.enable_log {
            info!(target: "strata_orm::sql", backend = "native", sql);
        } else {
            log_statement(BackendType::Native, sql);
        }
    }

    /// Reopen a broken connection before the next call when allowed
    fn ensure_connection(&mut self) -> OrmResult<()> {
        if self.conn.is_none() {
            return Err(OrmError::NotConnected);
        }
        if !self.broken || !self.config.auto_reconnect {
            return Ok(());
        }

        if self.transaction.is_active() {
            warn!("connection lost inside a transaction; the transaction is gone");
            self.transaction = TransactionState::Idle;
        }
        warn!(host = %self.config.host, "reconnecting broken native connection");
        let conn = open(&self.runtime, &self.config)?;
        self.conn = Some(conn);
        self.broken = false;
        Ok(())
    }

    fn settle<T>(&mut self, outcome: Result<T, Failure>) -> OrmResult<T> {
        outcome.map_err(|failure| {
            if failure.breaks_connection() {
                self.broken = true;
            }
            OrmError::QueryFailed(failure.to_string())
        })
    }

    fn execute_raw(&mut self, sql: &str, timeout: u64) -> OrmResult<u64> {
        self.ensure_connection()?;
        self.log(sql);
        let conn = self.conn.as_mut().ok_or(OrmError::NotConnected)?;
        let outcome = block_on_timeout(&self.runtime, timeout, conn.execute(sql));
        let done = self.settle(outcome)?;
        if done.last_insert_id() != 0 {
            self.last_insert_id = done.last_insert_id();
        }
        Ok(done.rows_affected())
    }
}

impl Connection for NativeConnection {
    fn query(&mut self, sql: &str) -> OrmResult<ResultSet> {
        self.ensure_connection()?;
        self.log(sql);
        let timeout = self.config.read_timeout;
        let conn = self.conn.as_mut().ok_or(OrmError::NotConnected)?;
        let outcome = block_on_timeout(&self.runtime, timeout, conn.fetch_all(sql));
        let rows = self.settle(outcome)?;
        Ok(to_result_set(rows))
    }

    fn exec(&mut self, sql: &str) -> OrmResult<u64> {
        let timeout = self.config.write_timeout;
        self.execute_raw(sql, timeout)
    }

    fn begin_transaction(&mut self) -> OrmResult<()> {
        self.transaction.ensure_can_begin()?;
        let timeout = self.config.write_timeout;
        self.execute_raw("START TRANSACTION", timeout)?;
        self.transaction = TransactionState::InTransaction;
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.transaction.ensure_active()?;
        let timeout = self.config.write_timeout;
        self.execute_raw("COMMIT", timeout)?;
        self.transaction = TransactionState::Idle;
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.transaction.ensure_active()?;
        let timeout = self.config.write_timeout;
        let result = self.execute_raw("ROLLBACK", timeout).map(|_| ());
        self.transaction = TransactionState::Idle;
        result
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    fn close(&mut self) -> OrmResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.transaction = TransactionState::Idle;
        let outcome = block_on_timeout(&self.runtime, self.config.write_timeout, conn.close());
        info!(host = %self.config.host, "native connection closed");
        outcome.map_err(|failure| OrmError::QueryFailed(failure.to_string()))
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Native
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some() && !self.broken
    }

    fn ping(&mut self) -> OrmResult<()> {
        self.ensure_connection()?;
        let timeout = self.config.read_timeout;
        let conn = self.conn.as_mut().ok_or(OrmError::NotConnected)?;
        let outcome = block_on_timeout(&self.runtime, timeout, conn.ping());
        self.settle(outcome)
    }
}
