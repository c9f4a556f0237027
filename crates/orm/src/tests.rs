//! End-to-end tests for strata-orm
//!
//! Builder output, model binding and the full CRUD path against the
//! in-memory backend.

use std::sync::{Arc, Mutex};

use crate::backends::{MemoryConnection, MemoryHandle, ResultSet, Row};
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::events::ModelEvent;
use crate::model::{define, CrudOperations, Model};
use crate::query::{OrderDirection, QueryBuilder};
use crate::security::escape_string;
use crate::value::Value;

/// Test model for use in tests
#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: u64,
    email: String,
    balance: f64,
    active: bool,
    nickname: Option<String>,
}

impl Model for Account {
    const FIELDS: &'static [&'static str] = &["id", "email", "balance", "active", "nickname"];

    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.get("id"),
            email: row.get("email"),
            balance: row.get("balance"),
            active: row.get("active"),
            nickname: row.get("nickname"),
        })
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("email", self.email.as_str().into()),
            ("balance", self.balance.into()),
            ("active", self.active.into()),
            ("nickname", self.nickname.clone().into()),
        ]
    }
}

fn new_account(email: &str) -> Account {
    Account {
        id: 0,
        email: email.to_string(),
        balance: 10.5,
        active: true,
        nickname: None,
    }
}

fn memory() -> (Database, MemoryHandle) {
    let conn = MemoryConnection::new();
    let handle = conn.handle();
    (Database::new(Box::new(conn)), handle)
}

fn account_rows(rows: &[(&str, &str)]) -> ResultSet {
    ResultSet::from_rows(
        vec!["id", "email", "balance", "active", "nickname"],
        rows.iter()
            .map(|(id, email)| {
                vec![
                    Some(id.to_string()),
                    Some(email.to_string()),
                    Some("10.5".to_string()),
                    Some("1".to_string()),
                    None,
                ]
            })
            .collect::<Vec<_>>(),
    )
}

#[test]
fn test_select_with_comparison_order_and_limit() {
    let sql = QueryBuilder::table("users")
        .where_condition("age", ">", 18)
        .order("age", OrderDirection::Desc)
        .limit(10)
        .build_select();
    assert_eq!(sql, "SELECT * FROM users WHERE age > 18 ORDER BY age DESC LIMIT 10");
}

#[test]
fn test_escape_doubles_quotes() {
    assert_eq!(escape_string("it's"), "'it''s'");
    assert_eq!(escape_string(""), "''");
}

#[test]
fn test_prepared_select_keeps_call_order() {
    let stmt = QueryBuilder::table("users")
        .where_eq("name", "Ann")
        .where_gt("age", 30)
        .build_prepared_select();
    assert_eq!(stmt.sql, "SELECT * FROM users WHERE name = ? AND age > ?");
    assert_eq!(stmt.sql.matches('?').count(), 2);
    assert_eq!(stmt.params, vec![Value::from("Ann"), Value::Int(30)]);
}

#[test]
fn test_definition_resolves_table_and_key() {
    let def = define::<Account>();
    assert_eq!(def.model_name, "Account");
    assert_eq!(def.table, "accounts");
    assert_eq!(def.primary_key, "id");
    assert!(def.has_field("nickname"));
    assert!(!def.soft_deletes);
}

#[test]
fn test_creating_cancel_runs_no_sql() {
    let (mut db, handle) = memory();
    db.observe::<Account>().on(ModelEvent::Creating, |ctx| ctx.cancel());
    let before = handle.insert_count();

    let result = Account::create(&mut db, &new_account("a@example.com"));

    assert!(matches!(result, Err(OrmError::Cancelled { .. })));
    assert_eq!(handle.insert_count(), before);
    assert_eq!(handle.query_count(), 0);
}

#[test]
fn test_saving_cancel_also_stops_updates() {
    let (mut db, handle) = memory();
    db.observe::<Account>().on(ModelEvent::Saving, |ctx| ctx.cancel());

    let err = Account::update(&mut db, 1, &new_account("a@example.com")).unwrap_err();
    assert_eq!(
        err,
        OrmError::Cancelled {
            model: "Account".to_string(),
            event: "saving".to_string()
        }
    );
    assert_eq!(handle.update_count(), 0);
}

#[test]
fn test_hydration_coerces_cells() {
    let (mut db, handle) = memory();
    handle.push_result(account_rows(&[("1", "a@example.com"), ("2", "b@example.com")]));

    let accounts = Account::all(&mut db).unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[1].id, 2);
    assert!(accounts[0].active);
    assert_eq!(accounts[0].balance, 10.5);
    assert_eq!(accounts[0].nickname, None);
}

#[test]
fn test_retrieved_fires_per_record() {
    let (mut db, handle) = memory();
    let emails = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&emails);
    db.observe::<Account>().on(ModelEvent::Retrieved, move |ctx| {
        if let Some(account) = ctx.record {
            sink.lock().unwrap().push(account.email.clone());
        }
    });

    handle.push_result(account_rows(&[("1", "a@example.com"), ("2", "b@example.com")]));
    Account::all(&mut db).unwrap();

    assert_eq!(*emails.lock().unwrap(), vec!["a@example.com", "b@example.com"]);
}

#[test]
fn test_create_escapes_hostile_input() {
    let (mut db, handle) = memory();
    handle.push_result(account_rows(&[("1", "x")]));

    let hostile = new_account("'); DROP TABLE accounts; --");
    Account::create(&mut db, &hostile).unwrap();

    assert_eq!(
        handle.statements()[0],
        "INSERT INTO accounts (email, balance, active, nickname) \
         VALUES ('''); DROP TABLE accounts; --', 10.5, 1, NULL)"
    );
}

#[test]
fn test_count_and_exists() {
    let (mut db, handle) = memory();
    handle.push_result(ResultSet::from_rows(vec!["count"], vec![vec![Some("3".to_string())]]));
    assert_eq!(Account::count(&mut db).unwrap(), 3);
    assert_eq!(handle.last_statement().unwrap(), "SELECT COUNT(*) FROM accounts");

    assert!(!Account::exists(&mut db, 9).unwrap());
}

#[test]
fn test_backend_errors_surface_unchanged() {
    let (mut db, handle) = memory();
    handle.fail_next("lost connection");
    assert_eq!(
        Account::all(&mut db).unwrap_err(),
        OrmError::QueryFailed("lost connection".to_string())
    );
}
