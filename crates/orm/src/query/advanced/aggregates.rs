//! Aggregate expressions and raw SELECT/HAVING fragments

use super::AdvancedQueryBuilder;
use crate::error::OrmResult;
use crate::query::builder::QueryBuilder;
use crate::security::RawSql;

fn aggregate(function: &str, column: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("{}({}) AS {}", function, column, alias),
        None => format!("{}({})", function, column),
    }
}

impl AdvancedQueryBuilder {
    fn push_aggregate(mut self, expression: String) -> Self {
        self.aggregates.push(expression);
        self
    }

    /// Add `COUNT(column)[ AS alias]`
    pub fn select_count(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("COUNT", column, alias))
    }

    /// Add `SUM(column)[ AS alias]`
    pub fn select_sum(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("SUM", column, alias))
    }

    /// Add `AVG(column)[ AS alias]`
    pub fn select_avg(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("AVG", column, alias))
    }

    /// Add `MIN(column)[ AS alias]`
    pub fn select_min(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("MIN", column, alias))
    }

    /// Add `MAX(column)[ AS alias]`
    pub fn select_max(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("MAX", column, alias))
    }

    /// Add `COUNT(DISTINCT column)[ AS alias]`
    pub fn select_count_distinct(self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(aggregate("COUNT", &format!("DISTINCT {}", column), alias))
    }

    /// Append a trusted expression to the SELECT list, verbatim
    ///
    /// Every raw hatch fails with `InvalidQuery` when the fragment's
    /// placeholder count does not match its bindings.
    pub fn select_raw(mut self, raw: RawSql) -> OrmResult<Self> {
        let (sql, bindings) = raw.checked()?.into_parts();
        self.base = self.base.select_expression(sql, bindings);
        Ok(self)
    }

    /// AND a trusted fragment into WHERE, verbatim
    pub fn where_raw(mut self, raw: RawSql) -> OrmResult<Self> {
        self.base = self.base.where_sql(raw)?;
        Ok(self)
    }

    /// OR a trusted fragment into WHERE, verbatim
    pub fn or_where_raw(mut self, raw: RawSql) -> OrmResult<Self> {
        self.base = self.base.or_where_sql(raw)?;
        Ok(self)
    }

    /// AND a trusted fragment into HAVING, verbatim
    pub fn having_raw(mut self, raw: RawSql) -> OrmResult<Self> {
        let condition = QueryBuilder::raw_condition(raw)?;
        self.base = self.base.having_fragment(condition);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates_precede_plain_fields() {
        let sql = AdvancedQueryBuilder::table("orders")
            .select("status")
            .select_sum("total", Some("revenue"))
            .select_count_distinct("user_id", None)
            .group_by("status")
            .build_select();
        assert_eq!(
            sql,
            "SELECT SUM(total) AS revenue, COUNT(DISTINCT user_id), status FROM orders GROUP BY status"
        );
    }

    #[test]
    fn test_every_aggregate_function() {
        let sql = AdvancedQueryBuilder::table("t")
            .select_count("*", None)
            .select_avg("a", Some("avg_a"))
            .select_min("a", None)
            .select_max("a", None)
            .build_select();
        assert_eq!(sql, "SELECT COUNT(*), AVG(a) AS avg_a, MIN(a), MAX(a) FROM t");
    }

    #[test]
    fn test_raw_fragments_are_verbatim() -> OrmResult<()> {
        let sql = AdvancedQueryBuilder::table("users")
            .select_raw(RawSql::trusted("UPPER(name) AS shout"))?
            .where_raw(RawSql::trusted("score > ? * 2").bind(10))?
            .group_by("name")
            .having_raw(RawSql::trusted("MAX(score) < 100"))?
            .build_select();
        assert_eq!(
            sql,
            "SELECT UPPER(name) AS shout FROM users WHERE score > 10 * 2 GROUP BY name HAVING MAX(score) < 100"
        );
        Ok(())
    }

    #[test]
    fn test_raw_bindings_are_escaped() {
        let sql = AdvancedQueryBuilder::table("users")
            .where_raw(RawSql::trusted("name = ?").bind("x' OR '1'='1"))
            .unwrap()
            .build_select();
        assert_eq!(sql, "SELECT * FROM users WHERE name = 'x'' OR ''1''=''1'");
    }

    #[test]
    fn test_unbalanced_raw_fragments_are_rejected() {
        use crate::error::OrmError;

        let extra = AdvancedQueryBuilder::table("t").where_raw(RawSql::trusted("a = ?").bind(1).bind(2));
        assert!(matches!(extra, Err(OrmError::InvalidQuery(_))));

        let missing = AdvancedQueryBuilder::table("t").select_raw(RawSql::trusted("COALESCE(a, ?)"));
        assert!(matches!(missing, Err(OrmError::InvalidQuery(_))));

        let having = AdvancedQueryBuilder::table("t")
            .group_by("a")
            .having_raw(RawSql::trusted("COUNT(*) > ? AND SUM(b) < ?").bind(1));
        assert!(matches!(having, Err(OrmError::InvalidQuery(_))));

        let or_where = AdvancedQueryBuilder::table("t").or_where_raw(RawSql::trusted("b IS NULL").bind(3));
        assert!(matches!(or_where, Err(OrmError::InvalidQuery(_))));
    }
}
