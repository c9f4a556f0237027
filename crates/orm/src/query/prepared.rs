//! Parameterized SQL plus its bound values

use std::fmt;

use crate::security::{count_placeholders, substitute_placeholders, RawSql};
use crate::value::Value;

/// SQL text with `?` placeholders retained and the values that fill them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreparedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders outside string literals
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }

    /// Plain SQL for backends without native parameter binding
    ///
    /// One left-to-right scan replaces the i-th placeholder with
    /// `params[i].to_sql()`.
    pub fn to_executable_sql(&self) -> String {
        substitute_placeholders(&self.sql, &self.params)
    }

    /// `sql [p1, p2, ...]` for logs; not meant to be executed
    pub fn debug(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Value::to_sql).collect();
        format!("{} [{}]", self.sql, params.join(", "))
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug())
    }
}

/// A rendered statement is trusted SQL: its values stay bound, never inlined
impl From<PreparedStatement> for RawSql {
    fn from(stmt: PreparedStatement) -> Self {
        stmt.params
            .into_iter()
            .fold(RawSql::trusted(stmt.sql), |raw, value| raw.bind(value))
    }
}
