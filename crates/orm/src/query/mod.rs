//! Query Builder Module - fluent SQL builder with inline and prepared rendering

pub mod advanced;
pub mod builder;
pub mod dml;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod prepared;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use advanced::{AdvancedQueryBuilder, Scope};
pub use builder::QueryBuilder;
pub use prepared::PreparedStatement;
pub use types::{Condition, JoinItem, JoinType, Logic, OrderDirection, OrderItem, QueryOperator};
