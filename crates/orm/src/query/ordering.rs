//! Query Builder ORDER BY operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add ORDER BY term with an explicit direction
    pub fn order(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push(OrderItem {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// Add ORDER BY clause (ascending)
    pub fn order_by(self, column: &str) -> Self {
        self.order(column, OrderDirection::Asc)
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order(column, OrderDirection::Desc)
    }
}
