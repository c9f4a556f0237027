//! Embedded-file backend on bundled SQLite
//!
//! Prepared statements are bound natively; only the plain `query`/`exec`
//! entry points take literal SQL. SQLite does not treat backslash as an
//! escape character, so values containing backslashes or control
//! characters should go through the prepared path.

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, ToSql};
use tracing::{error, info};

use super::config::EmbeddedConfig;
use super::core::{log_statement, Connection, TransactionState};
use super::result::ResultSet;
use super::BackendType;
use crate::error::{OrmError, OrmResult};
use crate::query::PreparedStatement;
use crate::value::{Value, TIMESTAMP_FORMAT};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sqlite;

        let output = match self {
            Value::Null => ToSqlOutput::Owned(Sqlite::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sqlite::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Sqlite::Integer(*i)),
            Value::UInt(u) => match i64::try_from(*u) {
                Ok(i) => ToSqlOutput::Owned(Sqlite::Integer(i)),
                Err(_) => ToSqlOutput::Owned(Sqlite::Text(u.to_string())),
            },
            Value::Float(f) if f.is_finite() => ToSqlOutput::Owned(Sqlite::Real(*f)),
            Value::Float(_) => ToSqlOutput::Owned(Sqlite::Null),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(Sqlite::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
        };
        Ok(output)
    }
}

/// Blobs are decoded as lossy UTF-8, like the native backend; see
/// `FromCell for Vec<u8>`
fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// SQLite-backed [`Connection`]
#[derive(Debug)]
pub struct EmbeddedConnection {
    conn: Option<rusqlite::Connection>,
    path: String,
    transaction: TransactionState,
}

impl EmbeddedConnection {
    /// Open (or create) the database file; `:memory:` opens a private
    /// in-memory database
    pub fn open(config: &EmbeddedConfig) -> OrmResult<Self> {
        let conn = rusqlite::Connection::open(&config.path).map_err(|e| {
            error!(path = %config.path, error = %e, "failed to open embedded database");
            OrmError::ConnectionFailed(format!("{}: {}", config.path, e))
        })?;
        info!(path = %config.path, "embedded database opened");
        Ok(Self {
            conn: Some(conn),
            path: config.path.clone(),
            transaction: TransactionState::Idle,
        })
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        Self::open(&EmbeddedConfig::default())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn conn(&self) -> OrmResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(OrmError::NotConnected)
    }

    fn run_query(&self, sql: &str, params: &[Value]) -> OrmResult<ResultSet> {
        log_statement(BackendType::Embedded, sql);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let mut result = ResultSet::new(columns);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(cell_text(row.get_ref(i)?));
            }
            result.push_row(values);
        }

        if column_count == 0 {
            result.affected_rows = conn.changes();
            result.last_insert_id = u64::try_from(conn.last_insert_rowid()).unwrap_or(0);
        }
        Ok(result)
    }

    fn run_exec(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        log_statement(BackendType::Embedded, sql);
        let affected = self.conn()?.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn batch(&self, sql: &str) -> OrmResult<()> {
        log_statement(BackendType::Embedded, sql);
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}

impl Connection for EmbeddedConnection {
    fn query(&mut self, sql: &str) -> OrmResult<ResultSet> {
        self.run_query(sql, &[])
    }

    fn exec(&mut self, sql: &str) -> OrmResult<u64> {
        self.run_exec(sql, &[])
    }

    fn begin_transaction(&mut self) -> OrmResult<()> {
        self.conn()?;
        self.transaction.ensure_can_begin()?;
        self.batch("BEGIN")?;
        self.transaction = TransactionState::InTransaction;
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.conn()?;
        self.transaction.ensure_active()?;
        self.batch("COMMIT")?;
        self.transaction = TransactionState::Idle;
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.conn()?;
        self.transaction.ensure_active()?;
        let result = self.batch("ROLLBACK");
        self.transaction = TransactionState::Idle;
        result
    }

    fn last_insert_id(&self) -> u64 {
        self.conn
            .as_ref()
            .and_then(|c| u64::try_from(c.last_insert_rowid()).ok())
            .unwrap_or(0)
    }

    fn close(&mut self) -> OrmResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.transaction = TransactionState::Idle;
        conn.close().map_err(|(_, e)| OrmError::QueryFailed(e.to_string()))?;
        info!(path = %self.path, "embedded database closed");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Embedded
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn query_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<ResultSet> {
        self.run_query(&stmt.sql, &stmt.params)
    }

    fn exec_prepared(&mut self, stmt: &PreparedStatement) -> OrmResult<u64> {
        self.run_exec(&stmt.sql, &stmt.params)
    }
}
