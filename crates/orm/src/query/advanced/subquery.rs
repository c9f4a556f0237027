//! Subqueries in WHERE and FROM
//!
//! Subqueries arrive as [`RawSql`]; a rendered [`PreparedStatement`]
//! converts into one with its values still bound. Unbalanced fragments fail
//! with `InvalidQuery`.
//!
//! [`PreparedStatement`]: crate::query::PreparedStatement

use super::AdvancedQueryBuilder;
use crate::error::OrmResult;
use crate::security::RawSql;

impl AdvancedQueryBuilder {
    fn subquery_condition(
        mut self,
        template: impl FnOnce(&str) -> String,
        subquery: RawSql,
    ) -> OrmResult<Self> {
        let (sql, bindings) = subquery.checked()?.into_parts();
        let condition = bindings
            .into_iter()
            .fold(RawSql::trusted(template(&sql)), |raw, value| raw.bind(value));
        self.base = self.base.where_sql(condition)?;
        Ok(self)
    }

    /// AND `EXISTS (<subquery>)` into WHERE
    pub fn where_exists(self, subquery: impl Into<RawSql>) -> OrmResult<Self> {
        self.subquery_condition(|sql| format!("EXISTS ({})", sql), subquery.into())
    }

    /// AND `NOT EXISTS (<subquery>)` into WHERE
    pub fn where_not_exists(self, subquery: impl Into<RawSql>) -> OrmResult<Self> {
        self.subquery_condition(|sql| format!("NOT EXISTS ({})", sql), subquery.into())
    }

    /// AND `column IN (<subquery>)` into WHERE
    pub fn where_in_subquery(self, column: &str, subquery: impl Into<RawSql>) -> OrmResult<Self> {
        self.subquery_condition(|sql| format!("{} IN ({})", column, sql), subquery.into())
    }

    /// Select from `(<subquery>) AS alias` instead of the table
    pub fn from_subquery(mut self, subquery: impl Into<RawSql>, alias: &str) -> OrmResult<Self> {
        let (sql, bindings) = subquery.into().checked()?.into_parts();
        self.base = self.base.from_fragment(format!("({}) AS {}", sql, alias), bindings);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use crate::value::Value;

    #[test]
    fn test_where_exists() {
        let sql = AdvancedQueryBuilder::table("users")
            .where_exists(RawSql::trusted(
                "SELECT 1 FROM posts WHERE posts.user_id = users.id",
            ))
            .unwrap()
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE EXISTS (SELECT 1 FROM posts WHERE posts.user_id = users.id)"
        );
    }

    #[test]
    fn test_where_not_exists_is_anded() {
        let sql = AdvancedQueryBuilder::table("users")
            .where_eq("active", true)
            .where_not_exists(RawSql::trusted("SELECT 1 FROM bans WHERE bans.user_id = users.id"))
            .unwrap()
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE active = 1 AND NOT EXISTS (SELECT 1 FROM bans WHERE bans.user_id = users.id)"
        );
    }

    #[test]
    fn test_where_in_subquery_from_builder() {
        let inner = QueryBuilder::table("orders")
            .select("user_id")
            .where_gt("total", 500)
            .build_prepared_select();
        let stmt = AdvancedQueryBuilder::table("users")
            .where_in_subquery("id", inner)
            .unwrap()
            .build_prepared_select();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders WHERE total > ?)"
        );
        assert_eq!(stmt.params, vec![Value::Int(500)]);
    }

    #[test]
    fn test_from_subquery() {
        let sql = AdvancedQueryBuilder::table("ignored")
            .from_subquery(
                RawSql::trusted("SELECT user_id, SUM(total) AS spent FROM orders GROUP BY user_id"),
                "totals",
            )
            .unwrap()
            .where_gt("spent", 100)
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT user_id, SUM(total) AS spent FROM orders GROUP BY user_id) AS totals WHERE spent > 100"
        );
    }

    #[test]
    fn test_from_subquery_bindings_come_before_where() {
        let stmt = AdvancedQueryBuilder::table("t")
            .from_subquery(RawSql::trusted("SELECT * FROM logs WHERE level = ?").bind("error"), "e")
            .unwrap()
            .where_eq("e.host", "db1")
            .build_prepared_select();
        assert_eq!(stmt.params, vec![Value::from("error"), Value::from("db1")]);
    }

    #[test]
    fn test_unbalanced_subquery_is_rejected() {
        let err = AdvancedQueryBuilder::table("users")
            .where_exists(RawSql::trusted("SELECT 1 FROM posts WHERE author = ?"))
            .unwrap_err();
        assert!(matches!(err, crate::error::OrmError::InvalidQuery(_)));

        let err = AdvancedQueryBuilder::table("t")
            .from_subquery(RawSql::trusted("SELECT * FROM logs").bind("error"), "e")
            .unwrap_err();
        assert!(matches!(err, crate::error::OrmError::InvalidQuery(_)));
    }
}
