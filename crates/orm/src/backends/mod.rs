//! Database Backend Abstractions
//!
//! Three interchangeable implementations of [`Connection`]: a native-protocol
//! MySQL client, an embedded SQLite file and an in-memory test double.

pub mod config;
pub mod core;
pub mod embedded;
pub mod memory;
pub mod native;
pub mod result;

pub use self::config::{DriverConfig, EmbeddedConfig, NativeConfig};
pub use self::core::{Connection, TransactionState};
pub use self::embedded::EmbeddedConnection;
pub use self::memory::{MemoryConnection, MemoryHandle};
pub use self::native::NativeConnection;
pub use self::result::{FromCell, ResultSet, Row};

use tracing::info;

use crate::error::OrmResult;

/// Backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    Native,
    Embedded,
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Native => write!(f, "native"),
            BackendType::Embedded => write!(f, "embedded"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" | "mysql" => Ok(BackendType::Native),
            "embedded" | "sqlite" => Ok(BackendType::Embedded),
            "memory" => Ok(BackendType::Memory),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}

/// Open a connection for `config`
pub fn connect(config: &DriverConfig) -> OrmResult<Box<dyn Connection>> {
    info!(backend = %config.backend_type(), "opening database connection");
    let conn: Box<dyn Connection> = match config {
        DriverConfig::Native(native) => Box::new(NativeConnection::connect(native.clone())?),
        DriverConfig::Embedded(embedded) => Box::new(EmbeddedConnection::open(embedded)?),
        DriverConfig::Memory => Box::new(MemoryConnection::new()),
    };
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("sqlite".parse::<BackendType>(), Ok(BackendType::Embedded));
        assert_eq!("MySQL".parse::<BackendType>(), Ok(BackendType::Native));
        assert!("oracle".parse::<BackendType>().is_err());
        assert_eq!(BackendType::Memory.to_string(), "memory");
    }

    #[test]
    fn test_connect_factory() {
        let conn = connect(&DriverConfig::Memory).unwrap();
        assert_eq!(conn.backend_type(), BackendType::Memory);

        let conn = connect(&DriverConfig::Embedded(EmbeddedConfig::default())).unwrap();
        assert_eq!(conn.backend_type(), BackendType::Embedded);
        assert!(conn.is_connected());
    }
}
