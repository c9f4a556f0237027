//! Query Builder SELECT list, GROUP BY and HAVING operations

use tracing::warn;

use super::builder::QueryBuilder;
use super::types::*;
use crate::value::Value;

impl QueryBuilder {
    /// Add SELECT fields; `"a, b"` is split on commas
    pub fn select(mut self, fields: &str) -> Self {
        if fields.trim() == "*" {
            return self;
        }
        self.select_fields.extend(
            fields
                .split(',')
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Add SELECT fields from a list
    pub fn select_fields(mut self, fields: &[&str]) -> Self {
        self.select_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Replace the SELECT list, dropping earlier fields and their bindings
    pub fn reselect(mut self, fields: &str) -> Self {
        self.select_fields.clear();
        self.select_bindings.clear();
        self.select(fields)
    }

    /// Render `SELECT DISTINCT`
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Push an expression onto the SELECT list together with its bindings
    pub(crate) fn select_expression(mut self, expression: String, bindings: Vec<Value>) -> Self {
        self.select_fields.push(expression);
        self.select_bindings.extend(bindings);
        self
    }

    /// Put expressions at the front of the SELECT list, ahead of plain fields
    pub(crate) fn prepend_select(mut self, expressions: &[String]) -> Self {
        let mut fields = expressions.to_vec();
        fields.append(&mut self.select_fields);
        self.select_fields = fields;
        self
    }

    /// Add GROUP BY column
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Add a HAVING comparison; unknown operators fall back to `=`
    pub fn having_condition<T: Into<Value>>(mut self, column: &str, operator: &str, value: T) -> Self {
        let op = QueryOperator::parse(operator).unwrap_or_else(|| {
            warn!(operator, "unknown comparison operator, using '='");
            QueryOperator::Equal
        });
        self.having
            .push(Condition::new(format!("{} {} ?", column, op), vec![value.into()]));
        self
    }

    /// Add a HAVING fragment with its own placeholders
    pub(crate) fn having_fragment(mut self, condition: Condition) -> Self {
        self.having.push(condition);
        self
    }
}
