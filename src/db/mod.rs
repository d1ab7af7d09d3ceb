//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The `Driver` contract and its MySQL and DSN backends
//! - SQL quoting and escaping
//! - Type normalization
//! - Row decoding and schema introspection
//! - Statement profiling

pub mod any;
pub mod compiler;
pub mod decode;
pub mod driver;
pub mod escape;
pub mod mysql;
pub mod profiler;
pub mod schema;
pub mod types;

pub use any::AnyDriver;
pub use compiler::{Compiler, Escape, Quoting, format_float, parse_type_length};
pub use driver::{ConnectionState, Driver};
pub use escape::{MySqlEscaper, PostgresEscaper, StandardEscaper};
pub use mysql::MySqlDriver;
pub use profiler::{DATABASE_GROUP, ProfileToken, Profiler, TracingProfiler};
pub use types::{Dialect, TypeDescriptor, TypeKind, TypeRegistry};

use crate::config::{DatabaseConfig, DriverKind};
use crate::error::DbResult;
use tracing::debug;

/// Build the driver the configuration asks for.
///
/// The driver connects lazily, on the first operation that needs the backend.
pub fn connect(config: DatabaseConfig) -> DbResult<Box<dyn Driver>> {
    config.validate()?;
    debug!(driver = %config.driver, "Creating driver");
    match config.driver {
        DriverKind::MySql => Ok(Box::new(MySqlDriver::new(config)?)),
        DriverKind::Dsn => Ok(Box::new(AnyDriver::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_picks_driver() {
        let db = connect(DatabaseConfig::from_url("mysql://app@localhost/shop").unwrap()).unwrap();
        assert_eq!(db.name(), "MySqlDriver");
        assert!(!db.is_connected());

        let db = connect(DatabaseConfig::from_url("sqlite::memory:").unwrap()).unwrap();
        assert_eq!(db.name(), "AnyDriver");
    }

    #[test]
    fn test_connect_validates_config() {
        let mut config = DatabaseConfig::from_url("mysql://localhost/shop").unwrap();
        config.identifier = Some("``".into());
        assert!(connect(config).is_err());
    }
}
