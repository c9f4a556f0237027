//! Query Builder SQL generation
//!
//! Clause order is fixed:
//! `SELECT [DISTINCT] fields FROM table [JOIN ...] [WHERE ...] [GROUP BY ...]
//! [HAVING ...] [ORDER BY ...] [LIMIT n] [OFFSET n]`.
//!
//! Inline rendering substitutes every placeholder with the escaped value;
//! prepared rendering keeps the placeholders and collects the values in the
//! same left-to-right order.

use super::builder::QueryBuilder;
use super::prepared::PreparedStatement;
use super::types::*;
use crate::security::substitute_placeholders;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderMode {
    Inline,
    Prepared,
}

/// SQL text under construction plus the values collected so far
pub(crate) struct SqlWriter {
    mode: RenderMode,
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Append a `?` template, inlining or collecting its values
    pub(crate) fn push_template(&mut self, template: &str, values: &[Value]) {
        match self.mode {
            RenderMode::Inline => {
                if values.is_empty() {
                    self.sql.push_str(template);
                } else {
                    self.sql.push_str(&substitute_placeholders(template, values));
                }
            }
            RenderMode::Prepared => {
                self.sql.push_str(template);
                self.params.extend(values.iter().cloned());
            }
        }
    }

    /// Append a single value as `?` or as its literal
    pub(crate) fn push_value(&mut self, value: &Value) {
        match self.mode {
            RenderMode::Inline => self.sql.push_str(&value.to_sql()),
            RenderMode::Prepared => {
                self.sql.push('?');
                self.params.push(value.clone());
            }
        }
    }

    pub(crate) fn push_conditions(&mut self, keyword: &str, conditions: &[Condition]) {
        if conditions.is_empty() {
            return;
        }
        self.push(keyword);
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                self.push(" ");
                self.push(&condition.logic.to_string());
                self.push(" ");
            }
            self.push_template(&condition.sql, &condition.values);
        }
    }

    pub(crate) fn finish(self) -> String {
        self.sql
    }

    pub(crate) fn into_statement(self) -> PreparedStatement {
        PreparedStatement::new(self.sql, self.params)
    }
}

impl QueryBuilder {
    pub(crate) fn write_from_and_joins(&self, w: &mut SqlWriter) {
        w.push(" FROM ");
        w.push_template(&self.table, &self.from_bindings);
        for join in &self.joins {
            w.push(" ");
            w.push(&join.to_string());
        }
    }

    /// Everything up to and including HAVING
    fn write_select_body(&self, w: &mut SqlWriter) {
        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if self.select_fields.is_empty() {
            w.push("*");
        } else {
            w.push_template(&self.select_fields.join(", "), &self.select_bindings);
        }

        self.write_from_and_joins(w);
        w.push_conditions(" WHERE ", &self.conditions);

        if !self.group_by.is_empty() {
            w.push(" GROUP BY ");
            w.push(&self.group_by.join(", "));
        }

        w.push_conditions(" HAVING ", &self.having);
    }

    fn write_select(&self, w: &mut SqlWriter) {
        self.write_select_body(w);

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            w.push(" ORDER BY ");
            w.push(&terms.join(", "));
        }

        if let Some(limit) = self.limit {
            w.push(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            w.push(&format!(" OFFSET {}", offset));
        }
    }

    /// Grouped and distinct queries count result rows, not table rows
    fn counts_rows_of_select(&self) -> bool {
        self.distinct || !self.group_by.is_empty() || !self.having.is_empty()
    }

    fn write_count(&self, w: &mut SqlWriter) {
        if self.counts_rows_of_select() {
            w.push("SELECT COUNT(*) FROM (");
            self.write_select_body(w);
            w.push(") AS sub");
            return;
        }
        w.push("SELECT COUNT(*)");
        self.write_from_and_joins(w);
        w.push_conditions(" WHERE ", &self.conditions);
    }

    fn write_delete(&self, w: &mut SqlWriter) {
        w.push("DELETE FROM ");
        w.push_template(&self.table, &self.from_bindings);
        w.push_conditions(" WHERE ", &self.conditions);
        if let Some(limit) = self.limit {
            w.push(&format!(" LIMIT {}", limit));
        }
    }

    /// Render the SELECT with every value inlined
    pub fn build_select(&self) -> String {
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_select(&mut w);
        w.finish()
    }

    /// Render `SELECT COUNT(*)` over the same FROM, joins and WHERE
    ///
    /// Grouped, HAVING-filtered or distinct queries are counted as
    /// `SELECT COUNT(*) FROM (<select>) AS sub`, without ORDER BY, LIMIT or
    /// OFFSET.
    pub fn build_count(&self) -> String {
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_count(&mut w);
        w.finish()
    }

    /// Render `DELETE FROM table [WHERE ...] [LIMIT n]`
    pub fn build_delete(&self) -> String {
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_delete(&mut w);
        w.finish()
    }

    /// Render the SELECT keeping placeholders
    pub fn build_prepared_select(&self) -> PreparedStatement {
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_select(&mut w);
        w.into_statement()
    }

    pub fn build_prepared_count(&self) -> PreparedStatement {
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_count(&mut w);
        w.into_statement()
    }

    pub fn build_prepared_delete(&self) -> PreparedStatement {
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_delete(&mut w);
        w.into_statement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::count_placeholders;

    #[test]
    fn test_select_all_by_default() {
        assert_eq!(QueryBuilder::table("users").build_select(), "SELECT * FROM users");
    }

    #[test]
    fn test_full_clause_order() {
        let sql = QueryBuilder::table("orders")
            .distinct()
            .select("user_id, status")
            .join("users", "users.id", "orders.user_id")
            .where_eq("status", "paid")
            .group_by("user_id")
            .group_by("status")
            .having_condition("COUNT(*)", ">", 2)
            .order_by("user_id")
            .limit(5)
            .offset(10)
            .build_select();

        assert_eq!(
            sql,
            "SELECT DISTINCT user_id, status FROM orders \
             INNER JOIN users ON users.id = orders.user_id \
             WHERE status = 'paid' GROUP BY user_id, status \
             HAVING COUNT(*) > 2 ORDER BY user_id ASC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_or_logic_in_insertion_order() {
        let sql = QueryBuilder::table("users")
            .where_eq("role", "admin")
            .or_where_eq("role", "owner")
            .where_not_null("email")
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE role = 'admin' OR role = 'owner' AND email IS NOT NULL"
        );
    }

    #[test]
    fn test_count_ignores_order_and_limit() {
        let builder = QueryBuilder::table("users")
            .left_join("teams", "teams.id", "users.team_id")
            .where_gt("age", 21)
            .order_by("age")
            .limit(3);
        assert_eq!(
            builder.build_count(),
            "SELECT COUNT(*) FROM users LEFT JOIN teams ON teams.id = users.team_id WHERE age > 21"
        );
    }

    #[test]
    fn test_grouped_count_wraps_select() {
        let builder = QueryBuilder::table("orders")
            .select("status")
            .where_ne("status", "void")
            .group_by("status")
            .order_by("status")
            .limit(2);
        assert_eq!(
            builder.build_count(),
            "SELECT COUNT(*) FROM (SELECT status FROM orders WHERE status != 'void' GROUP BY status) AS sub"
        );

        let having = builder.clone().having_condition("COUNT(*)", ">", 1).build_prepared_count();
        assert_eq!(
            having.sql,
            "SELECT COUNT(*) FROM (SELECT status FROM orders WHERE status != ? GROUP BY status HAVING COUNT(*) > ?) AS sub"
        );
        assert_eq!(having.params, vec![Value::from("void"), Value::Int(1)]);
        assert_eq!(count_placeholders(&having.sql), having.params.len());
    }

    #[test]
    fn test_distinct_count_wraps_select() {
        let sql = QueryBuilder::table("orders").distinct().select("user_id").build_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM (SELECT DISTINCT user_id FROM orders) AS sub");
    }

    #[test]
    fn test_delete_shape() {
        assert_eq!(QueryBuilder::table("logs").build_delete(), "DELETE FROM logs");
        assert_eq!(
            QueryBuilder::table("logs").where_lt("id", 100).limit(50).build_delete(),
            "DELETE FROM logs WHERE id < 100 LIMIT 50"
        );
    }

    #[test]
    fn test_prepared_keeps_placeholders_in_order() {
        let stmt = QueryBuilder::table("users")
            .where_eq("name", "bob")
            .where_between("age", 18, 65)
            .where_in("role", vec!["a", "b"])
            .build_prepared_select();

        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE name = ? AND age BETWEEN ? AND ? AND role IN (?, ?)"
        );
        assert_eq!(count_placeholders(&stmt.sql), stmt.params.len());
        assert_eq!(
            stmt.params,
            vec![
                Value::from("bob"),
                Value::Int(18),
                Value::Int(65),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_prepared_count_and_delete() {
        let builder = QueryBuilder::table("users").where_eq("id", 9u64);
        let count = builder.build_prepared_count();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM users WHERE id = ?");
        assert_eq!(count.params, vec![Value::UInt(9)]);

        let delete = builder.build_prepared_delete();
        assert_eq!(delete.sql, "DELETE FROM users WHERE id = ?");
        assert_eq!(delete.to_executable_sql(), "DELETE FROM users WHERE id = 9");
    }

    #[test]
    fn test_empty_in_list() {
        let sql = QueryBuilder::table("t").where_in::<i32>("id", vec![]).build_select();
        assert_eq!(sql, "SELECT * FROM t WHERE 1 = 0");
    }

    #[test]
    fn test_page_sugar() {
        let sql = QueryBuilder::table("t").page(3, 20).build_select();
        assert_eq!(sql, "SELECT * FROM t LIMIT 20 OFFSET 40");
        let first = QueryBuilder::table("t").page(0, 20).build_select();
        assert_eq!(first, "SELECT * FROM t LIMIT 20 OFFSET 0");
    }

    #[test]
    fn test_unknown_operator_falls_back_to_equal() {
        let sql = QueryBuilder::table("t").where_condition("a", "===", 1).build_select();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 1");
    }
}
