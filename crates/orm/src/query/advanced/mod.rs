//! Advanced query building: aggregates, subqueries, global scopes,
//! conditional composition and raw SQL fragments.
//!
//! [`AdvancedQueryBuilder`] wraps a plain [`QueryBuilder`]. Aggregates and
//! scopes are kept aside and folded in only when a statement is rendered, so
//! a scope can still be switched off after it was registered.

mod aggregates;
mod conditional;
mod scopes;
mod subquery;

pub use scopes::Scope;

use std::collections::HashSet;

use super::builder::QueryBuilder;
use super::prepared::PreparedStatement;
use super::types::OrderDirection;
use crate::value::Value;

/// Query builder with aggregate, subquery, scope and raw-SQL extensions
#[derive(Debug, Clone, Default)]
pub struct AdvancedQueryBuilder {
    base: QueryBuilder,
    aggregates: Vec<String>,
    scopes: Vec<Scope>,
    disabled_scopes: HashSet<String>,
    all_scopes_disabled: bool,
}

macro_rules! forward {
    ($( $(#[$meta:meta])* fn $name:ident $([$g:ident])? ( $($arg:ident : $ty:ty),* ); )*) => {
        $(
            $(#[$meta])*
            pub fn $name $(<$g: Into<Value>>)? (mut self, $($arg: $ty),*) -> Self {
                self.base = self.base.$name($($arg),*);
                self
            }
        )*
    };
}

impl AdvancedQueryBuilder {
    pub fn table(table: &str) -> Self {
        Self::from_builder(QueryBuilder::table(table))
    }

    pub fn from_builder(base: QueryBuilder) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    forward! {
        fn select(fields: &str);
        fn select_fields(fields: &[&str]);
        fn distinct();
        fn from(table: &str);
        fn where_condition[T](column: &str, operator: &str, value: T);
        fn or_where_condition[T](column: &str, operator: &str, value: T);
        fn where_eq[T](column: &str, value: T);
        fn or_where_eq[T](column: &str, value: T);
        fn where_ne[T](column: &str, value: T);
        fn where_gt[T](column: &str, value: T);
        fn where_gte[T](column: &str, value: T);
        fn where_lt[T](column: &str, value: T);
        fn where_lte[T](column: &str, value: T);
        fn where_like(column: &str, pattern: &str);
        fn or_where_like(column: &str, pattern: &str);
        fn where_in[T](column: &str, values: Vec<T>);
        fn or_where_in[T](column: &str, values: Vec<T>);
        fn where_not_in[T](column: &str, values: Vec<T>);
        fn where_null(column: &str);
        fn or_where_null(column: &str);
        fn where_not_null(column: &str);
        fn where_between[T](column: &str, start: T, end: T);
        fn join(table: &str, left_col: &str, right_col: &str);
        fn left_join(table: &str, left_col: &str, right_col: &str);
        fn right_join(table: &str, left_col: &str, right_col: &str);
        fn group_by(column: &str);
        fn having_condition[T](column: &str, operator: &str, value: T);
        fn order(column: &str, direction: OrderDirection);
        fn order_by(column: &str);
        fn order_by_desc(column: &str);
        fn limit(count: u64);
        fn offset(count: u64);
        fn page(page: u64, size: u64);
    }

    /// Replace the SELECT list, aggregates and raw expressions included
    pub fn reselect(mut self, fields: &str) -> Self {
        self.aggregates.clear();
        self.base = self.base.reselect(fields);
        self
    }

    /// The wrapped builder without aggregates or scopes applied
    pub fn base(&self) -> &QueryBuilder {
        &self.base
    }

    /// The plain builder that will actually be rendered: active scopes
    /// applied, aggregates placed ahead of the plain SELECT fields
    pub fn to_builder(&self) -> QueryBuilder {
        let active: Vec<&Scope> = self.active_scopes().collect();
        let mut builder = self.base.clone();
        if !active.is_empty() {
            builder = builder.group_conditions();
            for scope in active {
                builder = scope.apply(builder);
            }
        }
        if !self.aggregates.is_empty() {
            builder = builder.prepend_select(&self.aggregates);
        }
        builder
    }

    pub fn build_select(&self) -> String {
        self.to_builder().build_select()
    }

    pub fn build_count(&self) -> String {
        self.to_builder().build_count()
    }

    pub fn build_delete(&self) -> String {
        self.to_builder().build_delete()
    }

    pub fn build_prepared_select(&self) -> PreparedStatement {
        self.to_builder().build_prepared_select()
    }

    pub fn build_prepared_count(&self) -> PreparedStatement {
        self.to_builder().build_prepared_count()
    }

    pub fn build_prepared_delete(&self) -> PreparedStatement {
        self.to_builder().build_prepared_delete()
    }
}

impl From<QueryBuilder> for AdvancedQueryBuilder {
    fn from(base: QueryBuilder) -> Self {
        Self::from_builder(base)
    }
}
