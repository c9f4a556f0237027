//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    fn push_join(mut self, kind: JoinType, table: &str, left_col: &str, right_col: &str) -> Self {
        self.joins.push(JoinItem {
            kind,
            table: table.to_string(),
            on: format!("{} = {}", left_col, right_col),
        });
        self
    }

    /// Add INNER JOIN to the query
    pub fn join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.push_join(JoinType::Inner, table, left_col, right_col)
    }

    /// Add LEFT JOIN to the query
    pub fn left_join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.push_join(JoinType::Left, table, left_col, right_col)
    }

    /// Add RIGHT JOIN to the query
    pub fn right_join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.push_join(JoinType::Right, table, left_col, right_col)
    }
}
