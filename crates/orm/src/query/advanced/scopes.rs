//! Named global scopes

use std::fmt;
use std::sync::Arc;

use super::AdvancedQueryBuilder;
use crate::query::builder::QueryBuilder;

type ScopeFn = dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync;

/// A named predicate applied to every rendered query until switched off
#[derive(Clone)]
pub struct Scope {
    name: String,
    apply: Arc<ScopeFn>,
}

impl Scope {
    pub fn new<F>(name: &str, apply: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            apply: Arc::new(apply),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, builder: QueryBuilder) -> QueryBuilder {
        (self.apply)(builder)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("name", &self.name).finish()
    }
}

impl AdvancedQueryBuilder {
    /// Register a scope; a scope with the same name replaces the old one
    pub fn with_global_scope(mut self, scope: Scope) -> Self {
        self.scopes.retain(|s| s.name != scope.name);
        self.scopes.push(scope);
        self
    }

    pub fn with_global_scopes(self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        scopes
            .into_iter()
            .fold(self, |builder, scope| builder.with_global_scope(scope))
    }

    /// Exclude one scope by name from this query
    pub fn without_global_scope(mut self, name: &str) -> Self {
        self.disabled_scopes.insert(name.to_string());
        self
    }

    /// Exclude every registered scope from this query
    pub fn without_global_scopes(mut self) -> Self {
        self.all_scopes_disabled = true;
        self
    }

    /// Scopes that will be applied at render time, in registration order
    pub fn active_scopes(&self) -> impl Iterator<Item = &Scope> + '_ {
        let all_disabled = self.all_scopes_disabled;
        self.scopes
            .iter()
            .filter(move |s| !all_disabled && !self.disabled_scopes.contains(&s.name))
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_only() -> Scope {
        Scope::new("active", |q| q.where_eq("active", true))
    }

    fn tenant(id: i64) -> Scope {
        Scope::new("tenant", move |q| q.where_eq("tenant_id", id))
    }

    #[test]
    fn test_scopes_apply_in_order() {
        let sql = AdvancedQueryBuilder::table("users")
            .where_like("name", "a%")
            .with_global_scope(active_only())
            .with_global_scope(tenant(3))
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE name LIKE 'a%' AND active = 1 AND tenant_id = 3"
        );
    }

    #[test]
    fn test_without_global_scope() {
        let builder = AdvancedQueryBuilder::table("users")
            .with_global_scopes(vec![active_only(), tenant(3)])
            .without_global_scope("active");
        assert_eq!(builder.build_select(), "SELECT * FROM users WHERE tenant_id = 3");
        assert!(builder.has_scope("active"));
        assert_eq!(builder.active_scopes().count(), 1);
    }

    #[test]
    fn test_without_global_scopes() {
        let sql = AdvancedQueryBuilder::table("users")
            .with_global_scope(active_only())
            .without_global_scopes()
            .build_select();
        assert_eq!(sql, "SELECT * FROM users");
    }

    #[test]
    fn test_scope_binds_to_whole_or_group() {
        let sql = AdvancedQueryBuilder::table("users")
            .where_eq("role", "admin")
            .or_where_eq("role", "owner")
            .with_global_scope(active_only())
            .build_select();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE (role = 'admin' OR role = 'owner') AND active = 1"
        );
    }

    #[test]
    fn test_same_name_replaces() {
        let sql = AdvancedQueryBuilder::table("users")
            .with_global_scope(tenant(1))
            .with_global_scope(tenant(2))
            .build_select();
        assert_eq!(sql, "SELECT * FROM users WHERE tenant_id = 2");
    }

    #[test]
    fn test_scopes_apply_to_count_and_delete() {
        let builder = AdvancedQueryBuilder::table("users").with_global_scope(active_only());
        assert_eq!(builder.build_count(), "SELECT COUNT(*) FROM users WHERE active = 1");
        assert_eq!(builder.build_delete(), "DELETE FROM users WHERE active = 1");
    }
}
