//! Data models for the database client.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod expression;
pub mod query;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use expression::{Compile, Expression, Identifier, QualifiedName, SubQuery};
pub use query::{FromRow, IsolationLevel, Query, QueryResult, QueryType, ResultSet, Row};
pub use schema::{ColumnInfo, ColumnMap};
pub use value::Value;
