//! # strata-orm: synchronous database layer
//!
//! Value escaping, a fluent query builder with inline and prepared
//! rendering, pluggable connections (native MySQL, embedded SQLite and an
//! in-memory recorder), a connection pool and a lightweight ORM with
//! relations and lifecycle observers.
//!
//! ```no_run
//! use strata_orm::{Database, QueryBuilder};
//!
//! # fn main() -> strata_orm::OrmResult<()> {
//! let mut db = Database::connect_url("sqlite::memory:")?;
//! db.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let insert = QueryBuilder::table("users").build_prepared_insert(&[("name", "O'Brien".into())])?;
//! db.exec_prepared(&insert)?;
//!
//! let users = db.query_prepared(&QueryBuilder::table("users").where_eq("name", "O'Brien").build_prepared_select())?;
//! assert_eq!(users.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod connection;
pub mod database;
pub mod error;
pub mod events;
pub mod model;
pub mod observers;
pub mod query;
pub mod security;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod tests;



pub use backends::{
    BackendType, Connection, DriverConfig, EmbeddedConfig, FromCell, MemoryConnection,
    MemoryHandle, NativeConfig, ResultSet, Row,
};
pub use connection::{ConnectionPool, PoolConfig, PoolStats};
pub use database::Database;
pub use error::{OrmError, OrmResult};
pub use events::{EventContext, ModelEvent};
pub use model::{
    define, BelongsTo, CrudOperations, HasMany, HasOne, HasRelations, Model, ModelDefinition,
    ModelQuery, Page, Relationship,
};
pub use observers::{ModelObserver, ObserverManager};
pub use query::{AdvancedQueryBuilder, OrderDirection, PreparedStatement, QueryBuilder, Scope};
pub use security::{escape_bytes, escape_string, RawSql};
pub use transaction::TransactionGuard;
pub use value::Value;

#[cfg(feature = "derive")]
pub use strata_orm_derive::Model;
