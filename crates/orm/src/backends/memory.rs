//! In-memory backend for tests
//!
//! No storage and no SQL evaluation: every statement is checked for syntax
//! with `sqlparser`, recorded, classified by its leading keyword and
//! counted. SELECTs return result sets scripted in advance through a
//! [`MemoryHandle`] (or an empty set). Writes made inside a transaction are
//! staged and only reach the committed log and counters on commit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::core::{log_statement, Connection, TransactionState};
use super::result::ResultSet;
use super::BackendType;
use crate::error::{OrmError, OrmResult};

/// Statement counts by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub queries: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Insert,
    Update,
    Delete,
    Query,
    Other,
}

impl StatementKind {
    fn classify(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match keyword.as_str() {
            "INSERT" | "REPLACE" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "" => StatementKind::Query,
            _ => StatementKind::Other,
        }
    }

    fn is_write(self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

impl MemoryCounters {
    fn record(&mut self, kind: StatementKind) {
        match kind {
            StatementKind::Insert => self.inserts += 1,
            StatementKind::Update => self.updates += 1,
            StatementKind::Delete => self.deletes += 1,
            StatementKind::Query => self.queries += 1,
            StatementKind::Other => {}
        }
    }

    fn merge(&mut self, other: MemoryCounters) {
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.deletes += other.deletes;
        self.queries += other.queries;
    }
}

#[derive(Debug)]
struct MemoryState {
    connected: bool,
    transaction: TransactionState,
    executed: Vec<String>,
    committed: Vec<String>,
    staged: Vec<String>,
    counters: MemoryCounters,
    staged_counters: MemoryCounters,
    results: VecDeque<ResultSet>,
    affected: VecDeque<u64>,
    fail_next: Option<String>,
    next_insert_id: u64,
    last_insert_id: u64,
    transactions_committed: u64,
    transactions_rolled_back: u64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            connected: true,
            transaction: TransactionState::Idle,
            executed: Vec::new(),
            committed: Vec::new(),
            staged: Vec::new(),
            counters: MemoryCounters::default(),
            staged_counters: MemoryCounters::default(),
            results: VecDeque::new(),
            affected: VecDeque::new(),
            fail_next: None,
            next_insert_id: 1,
            last_insert_id: 0,
            transactions_committed: 0,
            transactions_rolled_back: 0,
        }
    }
}

impl MemoryState {
    /// Validate, record and count one statement
    fn run(&mut self, sql: &str) -> OrmResult<StatementKind> {
        if !self.connected {
            return Err(OrmError::NotConnected);
        }
        log_statement(BackendType::Memory, sql);

        if let Some(message) = self.fail_next.take() {
            return Err(OrmError::QueryFailed(message));
        }

        let statements = Parser::parse_sql(&MySqlDialect {}, sql)
            .map_err(|e| OrmError::QueryFailed(format!("{}: {}", e, sql)))?;
        match statements.len() {
            0 => return Err(OrmError::QueryFailed("empty statement".to_string())),
            1 => {}
            n => {
                return Err(OrmError::QueryFailed(format!(
                    "expected a single statement, got {}",
                    n
                )))
            }
        }

        let kind = StatementKind::classify(sql);
        self.executed.push(sql.to_string());

        if kind.is_write() {
            if self.transaction.is_active() {
                self.staged.push(sql.to_string());
                self.staged_counters.record(kind);
            } else {
                self.committed.push(sql.to_string());
                self.counters.record(kind);
            }
        } else {
            self.counters.record(kind);
        }

        if kind == StatementKind::Insert {
            self.last_insert_id = self.next_insert_id;
            self.next_insert_id += 1;
        }
        Ok(kind)
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory [`Connection`]
#[derive(Debug, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that stays usable after the connection moves into a `Database`
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Connection for MemoryConnection {
    fn query(&mut self, sql: &str) -> OrmResult<ResultSet> {
        let mut state = lock(&self.state);
        let kind = state.run(sql)?;
        match kind {
            StatementKind::Query => Ok(state.results.pop_front().unwrap_or_default()),
            kind if kind.is_write() => {
                let affected = state.affected.pop_front().unwrap_or(1);
                Ok(ResultSet {
                    affected_rows: affected,
                    last_insert_id: state.last_insert_id,
                    ..ResultSet::default()
                })
            }
            _ => Ok(ResultSet::default()),
        }
    }

    fn exec(&mut self, sql: &str) -> OrmResult<u64> {
        let mut state = lock(&self.state);
        let kind = state.run(sql)?;
        if kind.is_write() {
            Ok(state.affected.pop_front().unwrap_or(1))
        } else {
            Ok(0)
        }
    }

    fn begin_transaction(&mut self) -> OrmResult<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(OrmError::NotConnected);
        }
        state.transaction.ensure_can_begin()?;
        log_statement(BackendType::Memory, "BEGIN");
        state.transaction = TransactionState::InTransaction;
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(OrmError::NotConnected);
        }
        state.transaction.ensure_active()?;
        log_statement(BackendType::Memory, "COMMIT");

        let staged = std::mem::take(&mut state.staged);
        state.committed.extend(staged);
        let staged_counters = std::mem::take(&mut state.staged_counters);
        state.counters.merge(staged_counters);
        state.transaction = TransactionState::Idle;
        state.transactions_committed += 1;
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(OrmError::NotConnected);
        }
        state.transaction.ensure_active()?;
        log_statement(BackendType::Memory, "ROLLBACK");

        state.staged.clear();
        state.staged_counters = MemoryCounters::default();
        state.transaction = TransactionState::Idle;
        state.transactions_rolled_back += 1;
        Ok(())
    }

    fn last_insert_id(&self) -> u64 {
        lock(&self.state).last_insert_id
    }

    fn close(&mut self) -> OrmResult<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.staged.clear();
        state.staged_counters = MemoryCounters::default();
        state.transaction = TransactionState::Idle;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        lock(&self.state).transaction.is_active()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

/// Shared view of a [`MemoryConnection`] for scripting and assertions
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    /// Queue a result set for the next SELECT
    pub fn push_result(&self, result: ResultSet) {
        lock(&self.state).results.push_back(result);
    }

    /// Queue the affected-row count for the next write (default 1)
    pub fn push_affected(&self, rows: u64) {
        lock(&self.state).affected.push_back(rows);
    }

    /// Make the next statement fail with `QueryFailed(message)`
    pub fn fail_next(&self, message: &str) {
        lock(&self.state).fail_next = Some(message.to_string());
    }

    pub fn set_next_insert_id(&self, id: u64) {
        lock(&self.state).next_insert_id = id;
    }

    /// Committed counters; staged transaction writes are not included
    pub fn counters(&self) -> MemoryCounters {
        lock(&self.state).counters
    }

    pub fn insert_count(&self) -> u64 {
        self.counters().inserts
    }

    pub fn update_count(&self) -> u64 {
        self.counters().updates
    }

    pub fn delete_count(&self) -> u64 {
        self.counters().deletes
    }

    pub fn query_count(&self) -> u64 {
        self.counters().queries
    }

    /// Every statement that passed validation, in order
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state).executed.clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        lock(&self.state).executed.last().cloned()
    }

    /// Write statements that are durable: outside a transaction or committed
    pub fn committed_writes(&self) -> Vec<String> {
        lock(&self.state).committed.clone()
    }

    pub fn transactions_committed(&self) -> u64 {
        lock(&self.state).transactions_committed
    }

    pub fn transactions_rolled_back(&self) -> u64 {
        lock(&self.state).transactions_rolled_back
    }

    pub fn in_transaction(&self) -> bool {
        lock(&self.state).transaction.is_active()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn clear_log(&self) {
        lock(&self.state).executed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_kind() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();

        conn.exec("INSERT INTO users (name) VALUES ('a')").unwrap();
        conn.exec("UPDATE users SET name = 'b' WHERE id = 1").unwrap();
        conn.exec("DELETE FROM users WHERE id = 1").unwrap();
        conn.query("SELECT * FROM users").unwrap();

        assert_eq!(
            handle.counters(),
            MemoryCounters {
                inserts: 1,
                updates: 1,
                deletes: 1,
                queries: 1
            }
        );
        assert_eq!(handle.statements().len(), 4);
        assert_eq!(conn.last_insert_id(), 1);
    }

    #[test]
    fn test_invalid_sql_is_rejected() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();
        let err = conn.query("SELEC * FRM users").unwrap_err();
        assert!(matches!(err, OrmError::QueryFailed(_)));
        assert!(handle.statements().is_empty());
    }

    #[test]
    fn test_multiple_statements_are_rejected() {
        let mut conn = MemoryConnection::new();
        assert!(conn.exec("DELETE FROM a; DELETE FROM b").is_err());
    }

    #[test]
    fn test_scripted_results_fifo() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();
        handle.push_result(ResultSet::from_rows(["n"], vec![vec![Some("1".to_string())]]));
        handle.push_result(ResultSet::from_rows(["n"], vec![vec![Some("2".to_string())]]));

        assert_eq!(conn.query("SELECT 1").unwrap().scalar::<i32>(), Some(1));
        assert_eq!(conn.query("SELECT 2").unwrap().scalar::<i32>(), Some(2));
        assert!(conn.query("SELECT 3").unwrap().is_empty());
    }

    #[test]
    fn test_fail_next_is_one_shot() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();
        handle.fail_next("deadlock");
        assert_eq!(
            conn.exec("DELETE FROM t").unwrap_err(),
            OrmError::QueryFailed("deadlock".to_string())
        );
        assert_eq!(conn.exec("DELETE FROM t").unwrap(), 1);
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();

        conn.begin_transaction().unwrap();
        conn.exec("INSERT INTO t (a) VALUES (1)").unwrap();
        assert_eq!(handle.insert_count(), 0);
        conn.rollback().unwrap();

        assert_eq!(handle.insert_count(), 0);
        assert!(handle.committed_writes().is_empty());
        assert_eq!(handle.transactions_rolled_back(), 1);
    }

    #[test]
    fn test_commit_applies_staged_writes() {
        let mut conn = MemoryConnection::new();
        let handle = conn.handle();

        conn.begin_transaction().unwrap();
        conn.exec("INSERT INTO t (a) VALUES (1)").unwrap();
        conn.exec("UPDATE t SET a = 2").unwrap();
        conn.commit().unwrap();

        assert_eq!(handle.insert_count(), 1);
        assert_eq!(handle.update_count(), 1);
        assert_eq!(handle.committed_writes().len(), 2);
    }

    #[test]
    fn test_transaction_state_errors() {
        let mut conn = MemoryConnection::new();
        assert_eq!(conn.commit(), Err(OrmError::TransactionNotActive));
        assert_eq!(conn.rollback(), Err(OrmError::TransactionNotActive));
        conn.begin_transaction().unwrap();
        assert_eq!(conn.begin_transaction(), Err(OrmError::TransactionAlreadyActive));
        assert!(conn.in_transaction());
    }

    #[test]
    fn test_closed_connection() {
        let mut conn = MemoryConnection::new();
        conn.close().unwrap();
        assert_eq!(conn.query("SELECT 1").unwrap_err(), OrmError::NotConnected);
        assert!(!conn.handle().is_connected());
    }
}
