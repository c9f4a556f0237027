//! Query Builder WHERE clause operations
//!
//! Every method stores a `?` template plus its values; nothing is escaped
//! until the statement is rendered.

use tracing::warn;

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::OrmResult;
use crate::security::RawSql;
use crate::value::Value;

impl QueryBuilder {
    fn push_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn comparison(column: &str, op: QueryOperator, value: Value) -> Condition {
        Condition::new(format!("{} {} ?", column, op), vec![value])
    }

    fn in_list(column: &str, negated: bool, values: Vec<Value>) -> Condition {
        if values.is_empty() {
            // An empty list matches nothing (or everything when negated)
            let sql = if negated { "1 = 1" } else { "1 = 0" };
            return Condition::new(sql, Vec::new());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let keyword = if negated { "NOT IN" } else { "IN" };
        Condition::new(format!("{} {} ({})", column, keyword, placeholders), values)
    }

    /// Add a WHERE comparison such as `where_condition("age", ">", 18)`
    ///
    /// Unknown operators fall back to `=` and log a warning.
    pub fn where_condition<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        let op = QueryOperator::parse(operator).unwrap_or_else(|| {
            warn!(operator, "unknown comparison operator, using '='");
            QueryOperator::Equal
        });
        self.push_condition(Self::comparison(column, op, value.into()))
    }

    /// OR variant of [`QueryBuilder::where_condition`]
    pub fn or_where_condition<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        let op = QueryOperator::parse(operator).unwrap_or_else(|| {
            warn!(operator, "unknown comparison operator, using '='");
            QueryOperator::Equal
        });
        self.push_condition(Self::comparison(column, op, value.into()).or())
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::Equal, value.into()))
    }

    pub fn or_where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::Equal, value.into()).or())
    }

    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::NotEqual, value.into()))
    }

    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::GreaterThan, value.into()))
    }

    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(
            column,
            QueryOperator::GreaterThanOrEqual,
            value.into(),
        ))
    }

    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::LessThan, value.into()))
    }

    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(Self::comparison(
            column,
            QueryOperator::LessThanOrEqual,
            value.into(),
        ))
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::Like, pattern.into()))
    }

    pub fn or_where_like(self, column: &str, pattern: &str) -> Self {
        self.push_condition(Self::comparison(column, QueryOperator::Like, pattern.into()).or())
    }

    /// Add WHERE condition with IN; an empty list renders `1 = 0`
    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(Self::in_list(column, false, values))
    }

    pub fn or_where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(Self::in_list(column, false, values).or())
    }

    /// Add WHERE condition with NOT IN; an empty list renders `1 = 1`
    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(Self::in_list(column, true, values))
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(Condition::new(format!("{} IS NULL", column), Vec::new()))
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_condition(Condition::new(format!("{} IS NULL", column), Vec::new()).or())
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_condition(Condition::new(format!("{} IS NOT NULL", column), Vec::new()))
    }

    /// Add WHERE condition with BETWEEN
    pub fn where_between<T: Into<Value>>(self, column: &str, start: T, end: T) -> Self {
        self.push_condition(Condition::new(
            format!("{} BETWEEN ? AND ?", column),
            vec![start.into(), end.into()],
        ))
    }

    /// AND a trusted fragment with its own placeholders into WHERE
    ///
    /// Fails with `InvalidQuery` when the fragment's placeholder count does
    /// not match its bindings.
    pub fn where_sql(self, raw: RawSql) -> OrmResult<Self> {
        Ok(self.push_condition(Self::raw_condition(raw)?))
    }

    /// OR variant of [`QueryBuilder::where_sql`]
    pub fn or_where_sql(self, raw: RawSql) -> OrmResult<Self> {
        Ok(self.push_condition(Self::raw_condition(raw)?.or()))
    }

    /// Collapse the WHERE list into one parenthesized condition when it mixes
    /// OR terms, so conditions appended afterwards bind to the whole group.
    pub(crate) fn group_conditions(mut self) -> Self {
        if !self.conditions.iter().any(|c| c.logic == Logic::Or) {
            return self;
        }
        let mut sql = String::from("(");
        let mut values = Vec::new();
        for (i, condition) in self.conditions.drain(..).enumerate() {
            if i > 0 {
                sql.push_str(&format!(" {} ", condition.logic));
            }
            sql.push_str(&condition.sql);
            values.extend(condition.values);
        }
        sql.push(')');
        self.conditions.push(Condition::new(sql, values));
        self
    }

    pub(crate) fn raw_condition(raw: RawSql) -> OrmResult<Condition> {
        let (sql, bindings) = raw.checked()?.into_parts();
        Ok(Condition::new(sql, bindings))
    }
}
