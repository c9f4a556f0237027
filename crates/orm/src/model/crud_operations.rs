//! CRUD Operations - Create, Read, Update, Delete operations for models
//!
//! Every statement is built in prepared mode and handed to the backend with
//! its parameters. Pre-events (`saving`, `creating`, `updating`,
//! `deleting`, `restoring`) run before any SQL and can cancel the
//! operation.

use chrono::Utc;
use tracing::debug;

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::events::ModelEvent;
use crate::query::QueryBuilder;
use crate::value::Value;

use super::core_trait::Model;
use super::extensions::Page;
use super::query_methods::ModelQuery;

fn cancelled<M: Model>(event: ModelEvent) -> OrmError {
    debug!(model = M::model_name(), event = %event, "operation cancelled by observer");
    OrmError::Cancelled {
        model: M::model_name().to_string(),
        event: event.name().to_string(),
    }
}

/// Fire pre-events in order, failing on the first cancel
fn check_pre<M: Model>(
    db: &Database,
    events: &[ModelEvent],
    record: Option<&M>,
    key: Option<&Value>,
) -> OrmResult<()> {
    for &event in events {
        if !db.observers().emit_and_check::<M>(event, record, key) {
            return Err(cancelled::<M>(event));
        }
    }
    Ok(())
}

fn fire_post<M: Model>(db: &Database, events: &[ModelEvent], record: Option<&M>, key: Option<&Value>) {
    for &event in events {
        db.observers().emit_and_check::<M>(event, record, key);
    }
}

fn keyed_builder<M: Model>(key: &Value) -> QueryBuilder {
    QueryBuilder::table(&M::table_name()).where_eq(M::PRIMARY_KEY, key.clone())
}

/// Values to write, without the primary key when it is unset
fn insert_values<M: Model>(record: &M) -> Vec<(&'static str, Value)> {
    record
        .to_values()
        .into_iter()
        .filter(|(column, value)| *column != M::PRIMARY_KEY || !value.is_unset_key())
        .collect()
}

/// Create, Read, Update, Delete operations for every [`Model`]
pub trait CrudOperations: Model {
    /// A scoped query on this model's table
    fn query() -> ModelQuery<Self> {
        ModelQuery::new()
    }

    /// Look up one row by primary key; `Ok(None)` when no row matches
    fn find<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<Option<Self>> {
        let key = id.into();
        Self::query().where_eq(Self::PRIMARY_KEY, key).first(db)
    }

    /// Like [`find`](Self::find), failing with `ModelNotFound`
    fn find_or_fail<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<Self> {
        let key = id.into();
        Self::find(db, key.clone())?.ok_or_else(|| OrmError::ModelNotFound {
            table: Self::table_name(),
            key: key.to_sql(),
        })
    }

    fn all(db: &mut Database) -> OrmResult<Vec<Self>> {
        Self::query().get(db)
    }

    /// First row ordered by primary key
    fn first(db: &mut Database) -> OrmResult<Option<Self>> {
        Self::query().order_by(Self::PRIMARY_KEY).first(db)
    }

    fn count(db: &mut Database) -> OrmResult<u64> {
        Self::query().count(db)
    }

    /// True when a row with this primary key is visible
    fn exists<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<bool> {
        let key = id.into();
        Self::query().where_eq(Self::PRIMARY_KEY, key).exists(db)
    }

    fn paginate(db: &mut Database, page: u64, per_page: u64) -> OrmResult<Page<Self>> {
        Self::query().order_by(Self::PRIMARY_KEY).paginate(db, page, per_page)
    }

    /// INSERT `data`, then read the row back by its new id
    ///
    /// An unset primary key (null, zero or empty) is left out so the
    /// database assigns one. Events: `saving`, `creating`, INSERT,
    /// `created`, `saved`.
    fn create(db: &mut Database, data: &Self) -> OrmResult<Self> {
        check_pre(db, &[ModelEvent::Saving, ModelEvent::Creating], Some(data), None)?;

        let values = insert_values(data);
        let stmt = QueryBuilder::table(&Self::table_name())
            .build_prepared_insert(&values)
            .map_err(|e| OrmError::CreateFailed(e.to_string()))?;
        db.exec_prepared(&stmt)?;

        let provided = data.primary_key_value();
        let key = if !provided.is_unset_key() {
            provided
        } else {
            match db.last_insert_id() {
                0 => {
                    return Err(OrmError::CreateFailed(format!(
                        "no id reported for new {} row",
                        Self::table_name()
                    )))
                }
                id => Value::UInt(id),
            }
        };

        let created = Self::query()
            .without_global_scopes()
            .where_eq(Self::PRIMARY_KEY, key.clone())
            .first(db)?
            .ok_or_else(|| {
                OrmError::CreateFailed(format!(
                    "row {} not found in {} after insert",
                    key,
                    Self::table_name()
                ))
            })?;

        fire_post(db, &[ModelEvent::Created, ModelEvent::Saved], Some(&created), Some(&key));
        Ok(created)
    }

    /// Multi-row INSERT; fires no per-record events
    ///
    /// The primary key column is written only when some record sets it.
    fn insert_many(db: &mut Database, records: &[Self]) -> OrmResult<u64> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let include_key = records.iter().any(|r| !r.primary_key_value().is_unset_key());
        let columns: Vec<&str> = first
            .to_values()
            .into_iter()
            .map(|(column, _)| column)
            .filter(|column| include_key || *column != Self::PRIMARY_KEY)
            .collect();
        let rows: Vec<Vec<Value>> = records
            .iter()
            .map(|record| {
                record
                    .to_values()
                    .into_iter()
                    .filter(|(column, _)| include_key || *column != Self::PRIMARY_KEY)
                    .map(|(_, value)| value)
                    .collect()
            })
            .collect();

        let stmt = QueryBuilder::table(&Self::table_name())
            .build_prepared_insert_many(&columns, &rows)
            .map_err(|e| OrmError::CreateFailed(e.to_string()))?;
        db.exec_prepared(&stmt)
    }

    /// UPDATE every non-key column of the row `id`; returns the affected
    /// row count
    ///
    /// Events: `saving`, `updating`, UPDATE, `updated`, `saved`.
    fn update<K: Into<Value>>(db: &mut Database, id: K, data: &Self) -> OrmResult<u64> {
        let key = id.into();
        check_pre(db, &[ModelEvent::Saving, ModelEvent::Updating], Some(data), Some(&key))?;

        let values: Vec<(&'static str, Value)> = data
            .to_values()
            .into_iter()
            .filter(|(column, _)| *column != Self::PRIMARY_KEY)
            .collect();
        let stmt = keyed_builder::<Self>(&key)
            .build_prepared_update(&values)
            .map_err(|e| OrmError::UpdateFailed(e.to_string()))?;
        let affected = db.exec_prepared(&stmt)?;

        fire_post(db, &[ModelEvent::Updated, ModelEvent::Saved], Some(data), Some(&key));
        Ok(affected)
    }

    /// DELETE the row `id`; returns the affected row count
    fn destroy<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<u64> {
        let key = id.into();
        check_pre::<Self>(db, &[ModelEvent::Deleting], None, Some(&key))?;

        let stmt = keyed_builder::<Self>(&key).build_prepared_delete();
        let affected = db.exec_prepared(&stmt)?;

        fire_post::<Self>(db, &[ModelEvent::Deleted], None, Some(&key));
        Ok(affected)
    }

    /// Update the first row matching `attributes`, or create `data` when
    /// none does
    fn update_or_create(
        db: &mut Database,
        attributes: &[(&str, Value)],
        data: &Self,
    ) -> OrmResult<Self> {
        let existing = attributes
            .iter()
            .fold(Self::query(), |q, (column, value)| q.where_eq(column, value.clone()))
            .first(db)?;

        match existing {
            Some(record) => {
                let key = record.primary_key_value();
                if key.is_null() {
                    return Err(OrmError::PrimaryKeyNotFound(Self::PRIMARY_KEY.to_string()));
                }
                Self::update(db, key.clone(), data)?;
                Self::find_or_fail(db, key)
            }
            None => Self::create(db, data),
        }
    }

    /// Set the `deleted_at` column instead of removing the row
    ///
    /// Events: `deleting`, UPDATE, `deleted`.
    fn soft_delete<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<u64> {
        if !Self::SOFT_DELETES {
            return Err(OrmError::InvalidQuery(format!(
                "{} does not use soft deletes",
                Self::model_name()
            )));
        }
        let key = id.into();
        check_pre::<Self>(db, &[ModelEvent::Deleting], None, Some(&key))?;

        let stmt = keyed_builder::<Self>(&key)
            .build_prepared_update(&[(Self::DELETED_AT, Value::Timestamp(Utc::now()))])
            .map_err(|e| OrmError::UpdateFailed(e.to_string()))?;
        let affected = db.exec_prepared(&stmt)?;

        fire_post::<Self>(db, &[ModelEvent::Deleted], None, Some(&key));
        Ok(affected)
    }

    /// Clear `deleted_at` on a soft-deleted row
    ///
    /// Events: `restoring`, UPDATE, `restored`.
    fn restore<K: Into<Value>>(db: &mut Database, id: K) -> OrmResult<u64> {
        if !Self::SOFT_DELETES {
            return Err(OrmError::InvalidQuery(format!(
                "{} does not use soft deletes",
                Self::model_name()
            )));
        }
        let key = id.into();
        check_pre::<Self>(db, &[ModelEvent::Restoring], None, Some(&key))?;

        let stmt = keyed_builder::<Self>(&key)
            .build_prepared_update(&[(Self::DELETED_AT, Value::Null)])
            .map_err(|e| OrmError::UpdateFailed(e.to_string()))?;
        let affected = db.exec_prepared(&stmt)?;

        fire_post::<Self>(db, &[ModelEvent::Restored], None, Some(&key));
        Ok(affected)
    }
}

impl<M: Model> CrudOperations for M {}
