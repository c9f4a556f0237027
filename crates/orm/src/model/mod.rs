//! Model System - record types bound to tables
//!
//! - `core_trait`: the [`Model`] trait itself
//! - `crud_operations`: create, read, update and delete with observer events
//! - `query_methods`: scoped [`ModelQuery`] chains
//! - `relationships`: [`HasMany`], [`HasOne`] and [`BelongsTo`] over a foreign key
//! - `extensions`: table naming, [`ModelDefinition`] and [`Page`]

pub mod core_trait;
pub mod crud_operations;
pub mod extensions;
pub mod query_methods;
pub mod relationships;

pub use core_trait::{Model, SOFT_DELETE_SCOPE};
pub use crud_operations::CrudOperations;
pub use extensions::{define, derive_table_name, ModelDefinition, Page};
pub use query_methods::ModelQuery;
pub use relationships::{BelongsTo, HasMany, HasOne, HasRelations, Relationship, RelationshipMeta};
