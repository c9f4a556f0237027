//! Connection Management
//!
//! Connection pooling and pool statistics.

pub mod pool;
pub mod statistics;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig};
pub use statistics::PoolStats;
