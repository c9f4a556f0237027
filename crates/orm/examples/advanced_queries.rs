//! Example: Advanced queries with the AdvancedQueryBuilder
//!
//! Aggregates, subqueries, scopes and conditional clauses, printed in both
//! render modes.

use strata_orm::query::{AdvancedQueryBuilder, QueryBuilder, Scope};
use strata_orm::{OrmResult, RawSql};

fn show(label: &str, query: &AdvancedQueryBuilder) {
    let stmt = query.build_prepared_select();
    println!("{}:", label);
    println!("  inline:   {}", query.build_select());
    println!("  prepared: {}", stmt.debug());
}

fn main() -> OrmResult<()> {
    let min_age = Some(21);
    let search: Option<&str> = None;

    let users = AdvancedQueryBuilder::table("users")
        .with_global_scope(Scope::new("active", |q| q.where_eq("active", true)))
        .select("id, name, email")
        .when_some(min_age, |q, age| q.where_gte("age", age))
        .when_some(search, |q, term| q.where_like("name", &format!("%{}%", term)))
        .order_by("name")
        .page(2, 25);
    show("Active users, page 2", &users);

    let revenue = AdvancedQueryBuilder::table("orders")
        .select("customer_id")
        .select_sum("total", Some("revenue"))
        .select_count("id", Some("orders"))
        .group_by("customer_id")
        .having_raw(RawSql::trusted("SUM(total) > ?").bind(1_000))?
        .order_by_desc("customer_id");
    show("Revenue per customer", &revenue);

    let recent_buyers = QueryBuilder::table("orders")
        .select("user_id")
        .where_gt("created_at", "2024-01-01 00:00:00")
        .build_prepared_select();
    let buyers = AdvancedQueryBuilder::table("users")
        .where_in_subquery("id", recent_buyers)?
        .without_global_scopes();
    show("Users with recent orders", &buyers);

    let including_inactive = users.clone().without_global_scope("active");
    show("All users, page 2", &including_inactive);
    Ok(())
}
