//! Core Model Trait - Base definition for database entities
//!
//! Binds a record type to its table, primary key and column list, and to
//! the row mapping in both directions. Usually implemented through
//! `#[derive(Model)]`.

use crate::backends::Row;
use crate::error::OrmResult;
use crate::query::Scope;
use crate::value::Value;

use super::extensions::derive_table_name;

/// Name of the built-in scope that hides soft-deleted rows
pub const SOFT_DELETE_SCOPE: &str = "soft_deletes";

/// A record type stored in one table
pub trait Model: Sized + 'static {
    /// Explicit table name; derived from the type name when `None`
    const TABLE_NAME: Option<&'static str> = None;

    /// Primary key column
    const PRIMARY_KEY: &'static str = "id";

    /// Column names, in declaration order
    const FIELDS: &'static [&'static str];

    /// Rows carry a `deleted_at` column and are hidden once it is set
    const SOFT_DELETES: bool = false;

    /// Column written by `soft_delete` and cleared by `restore`
    const DELETED_AT: &'static str = "deleted_at";

    /// Short type name used in events and error messages
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }

    fn table_name() -> String {
        match Self::TABLE_NAME {
            Some(table) => table.to_string(),
            None => derive_table_name(Self::model_name()),
        }
    }

    /// Build a record from a result row, coercing cells per field type
    fn from_row(row: &Row) -> OrmResult<Self>;

    /// Column/value pairs for INSERT and UPDATE, primary key included
    fn to_values(&self) -> Vec<(&'static str, Value)>;

    /// Scopes applied to every query on this model
    fn global_scopes() -> Vec<Scope> {
        Vec::new()
    }

    fn primary_key_value(&self) -> Value {
        self.to_values()
            .into_iter()
            .find(|(column, _)| *column == Self::PRIMARY_KEY)
            .map(|(_, value)| value)
            .unwrap_or(Value::Null)
    }
}
