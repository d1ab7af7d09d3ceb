//! rdb: uniform access to relational databases.
//!
//! This library provides a `Driver` trait with MySQL and DSN-selected
//! backends, identifier and literal quoting, column type normalization and
//! a statement profiling hook.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DatabaseConfig};
pub use db::{AnyDriver, Driver, MySqlDriver, connect};
pub use error::{DbError, DbResult};
