//! Query Methods - scoped, chainable queries over one model
//!
//! [`ModelQuery`] wraps an [`AdvancedQueryBuilder`] preloaded with the
//! model's table and global scopes (plus the soft-delete scope for models
//! that use it) and materializes rows into records.

use std::marker::PhantomData;

use crate::backends::{FromCell, ResultSet};
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::events::{EventContext, ModelEvent};
use crate::query::{AdvancedQueryBuilder, OrderDirection, PreparedStatement, Scope};
use crate::security::RawSql;
use crate::value::Value;

use super::core_trait::{Model, SOFT_DELETE_SCOPE};
use super::extensions::Page;

/// Turn rows into records, firing `retrieved` for each
pub(crate) fn hydrate<M: Model>(db: &Database, set: &ResultSet) -> OrmResult<Vec<M>> {
    let mut records = Vec::with_capacity(set.len());
    for row in set {
        let record = M::from_row(row)?;
        let mut ctx = EventContext::new(ModelEvent::Retrieved, M::model_name()).with_record(&record);
        db.observers().emit(&mut ctx);
        records.push(record);
    }
    Ok(records)
}

macro_rules! forward {
    ($( $(#[$meta:meta])* fn $name:ident $([$g:ident])? ( $($arg:ident : $ty:ty),* ); )*) => {
        $(
            $(#[$meta])*
            pub fn $name $(<$g: Into<Value>>)? (mut self, $($arg: $ty),*) -> Self {
                self.builder = self.builder.$name($($arg),*);
                self
            }
        )*
    };
}

/// A query on the table of `M`
pub struct ModelQuery<M: Model> {
    builder: AdvancedQueryBuilder,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for ModelQuery<M> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for ModelQuery<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &M::model_name())
            .field("builder", &self.builder)
            .finish()
    }
}

impl<M: Model> Default for ModelQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> ModelQuery<M> {
    pub fn new() -> Self {
        let mut builder =
            AdvancedQueryBuilder::table(&M::table_name()).with_global_scopes(M::global_scopes());
        if M::SOFT_DELETES {
            builder = builder.with_global_scope(Scope::new(SOFT_DELETE_SCOPE, |q| {
                q.where_null(M::DELETED_AT)
            }));
        }
        Self {
            builder,
            _model: PhantomData,
        }
    }

    forward! {
        fn select(fields: &str);
        fn distinct();
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
        fn where_in[T](column: &str, values: Vec<T>);
        fn where_not_in[T](column: &str, values: Vec<T>);
        fn where_null(column: &str);
        fn where_not_null(column: &str);
        fn where_between[T](column: &str, start: T, end: T);
        fn join(table: &str, left_col: &str, right_col: &str);
        fn left_join(table: &str, left_col: &str, right_col: &str);
        fn order(column: &str, direction: OrderDirection);
        fn order_by(column: &str);
        fn order_by_desc(column: &str);
        fn limit(count: u64);
        fn offset(count: u64);
        fn with_global_scope(scope: Scope);
        fn without_global_scope(name: &str);
        fn without_global_scopes();
    }

    /// AND a trusted fragment into WHERE; unbalanced fragments fail with
    /// `InvalidQuery`
    pub fn where_raw(mut self, raw: RawSql) -> OrmResult<Self> {
        self.builder = self.builder.where_raw(raw)?;
        Ok(self)
    }

    /// Include soft-deleted rows
    pub fn with_trashed(mut self) -> Self {
        self.builder = self.builder.without_global_scope(SOFT_DELETE_SCOPE);
        self
    }

    /// Only soft-deleted rows
    pub fn only_trashed(mut self) -> Self {
        self.builder = self
            .builder
            .without_global_scope(SOFT_DELETE_SCOPE)
            .where_not_null(M::DELETED_AT);
        self
    }

    /// Apply `callback` to the underlying builder only when `condition`
    /// holds
    pub fn when<F>(mut self, condition: bool, callback: F) -> Self
    where
        F: FnOnce(AdvancedQueryBuilder) -> AdvancedQueryBuilder,
    {
        self.builder = self.builder.when(condition, callback);
        self
    }

    /// Apply `callback` to the underlying builder only when `condition`
    /// does not hold
    pub fn unless<F>(mut self, condition: bool, callback: F) -> Self
    where
        F: FnOnce(AdvancedQueryBuilder) -> AdvancedQueryBuilder,
    {
        self.builder = self.builder.unless(condition, callback);
        self
    }

    /// Arbitrary access to the underlying builder
    pub fn tap<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(AdvancedQueryBuilder) -> AdvancedQueryBuilder,
    {
        self.builder = callback(self.builder);
        self
    }

    pub fn builder(&self) -> &AdvancedQueryBuilder {
        &self.builder
    }

    pub fn into_builder(self) -> AdvancedQueryBuilder {
        self.builder
    }

    pub fn to_sql(&self) -> String {
        self.builder.build_select()
    }

    pub fn to_prepared(&self) -> PreparedStatement {
        self.builder.build_prepared_select()
    }

    pub fn get(&self, db: &mut Database) -> OrmResult<Vec<M>> {
        let set = db.query_prepared(&self.builder.build_prepared_select())?;
        hydrate(db, &set)
    }

    pub fn first(&self, db: &mut Database) -> OrmResult<Option<M>> {
        let stmt = self.builder.clone().limit(1).build_prepared_select();
        let set = db.query_prepared(&stmt)?;
        Ok(hydrate(db, &set)?.into_iter().next())
    }

    pub fn first_or_fail(&self, db: &mut Database) -> OrmResult<M> {
        self.first(db)?.ok_or_else(|| OrmError::ModelNotFound {
            table: M::table_name(),
            key: self.builder.base().bindings().iter().map(Value::to_sql).collect::<Vec<_>>().join(", "),
        })
    }

    pub fn count(&self, db: &mut Database) -> OrmResult<u64> {
        let set = db.query_prepared(&self.builder.build_prepared_count())?;
        Ok(set.scalar::<u64>().unwrap_or(0))
    }

    pub fn exists(&self, db: &mut Database) -> OrmResult<bool> {
        Ok(self.count(db)? > 0)
    }

    /// Page `page` (1-based) of `per_page` records, with the total count
    pub fn paginate(&self, db: &mut Database, page: u64, per_page: u64) -> OrmResult<Page<M>> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = self.count(db)?;
        let stmt = self
            .builder
            .clone()
            .page(page, per_page)
            .build_prepared_select();
        let set = db.query_prepared(&stmt)?;
        Ok(Page {
            items: hydrate(db, &set)?,
            total,
            page,
            per_page,
        })
    }

    /// `column` of every matching row; any earlier SELECT list is replaced
    pub fn pluck<T: FromCell>(&self, db: &mut Database, column: &str) -> OrmResult<Vec<T>> {
        let stmt = self.builder.clone().reselect(column).build_prepared_select();
        let set = db.query_prepared(&stmt)?;
        Ok(set.iter().map(|row| row.get_index::<T>(0)).collect())
    }

    /// Delete every matching row without firing per-record events
    pub fn delete(&self, db: &mut Database) -> OrmResult<u64> {
        db.exec_prepared(&self.builder.build_prepared_delete())
    }

    /// Update every matching row without firing per-record events
    pub fn update(&self, db: &mut Database, values: &[(&str, Value)]) -> OrmResult<u64> {
        let stmt = self
            .builder
            .to_builder()
            .build_prepared_update(values)
            .map_err(|e| OrmError::UpdateFailed(e.to_string()))?;
        db.exec_prepared(&stmt)
    }
}
