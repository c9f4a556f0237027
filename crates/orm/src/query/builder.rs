//! Query Builder - Core builder state

use super::types::*;
use crate::value::Value;

/// Chainable accumulator for one SQL statement against one table
///
/// The builder is consumed and returned by every method so calls chain:
///
/// ```
/// use strata_orm::query::QueryBuilder;
///
/// let sql = QueryBuilder::table("users")
///     .where_condition("age", ">", 18)
///     .order_by_desc("age")
///     .limit(10)
///     .build_select();
/// assert_eq!(sql, "SELECT * FROM users WHERE age > 18 ORDER BY age DESC LIMIT 10");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    pub(crate) table: String,
    pub(crate) from_bindings: Vec<Value>,
    pub(crate) select_fields: Vec<String>,
    pub(crate) select_bindings: Vec<Value>,
    pub(crate) distinct: bool,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) joins: Vec<JoinItem>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Vec<Condition>,
    pub(crate) order_by: Vec<OrderItem>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl QueryBuilder {
    /// Create a builder targeting `table`
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Replace the FROM target
    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self.from_bindings.clear();
        self
    }

    /// Replace the FROM target with a fragment carrying its own bindings
    pub(crate) fn from_fragment(mut self, sql: String, bindings: Vec<Value>) -> Self {
        self.table = sql;
        self.from_bindings = bindings;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Every bound value in render order: select list, FROM, WHERE, HAVING
    pub fn bindings(&self) -> Vec<Value> {
        self.select_bindings
            .iter()
            .chain(self.from_bindings.iter())
            .chain(self.conditions.iter().flat_map(|c| c.values.iter()))
            .chain(self.having.iter().flat_map(|c| c.values.iter()))
            .cloned()
            .collect()
    }
}
