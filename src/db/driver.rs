//! The driver contract shared by every backend.

use crate::db::compiler::Compiler;
use crate::db::profiler::Profiler;
use crate::db::types::TypeDescriptor;
use crate::error::{DbError, DbResult};
use crate::models::expression::QualifiedName;
use crate::models::query::{IsolationLevel, QueryResult, QueryType};
use crate::models::schema::ColumnMap;
use crate::models::value::Value;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Physical connection lifecycle of a driver.
///
/// `Disconnected` is terminal: a driver is not reconnected after an explicit
/// disconnect.
#[derive(Debug)]
pub enum ConnectionState<C> {
    Unconnected,
    Connected(C),
    Disconnected,
}

impl<C> Default for ConnectionState<C> {
    fn default() -> Self {
        Self::Unconnected
    }
}

impl<C> ConnectionState<C> {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Get the live connection, if any.
    pub fn connection(&mut self) -> Option<&mut C> {
        match self {
            Self::Connected(conn) => Some(conn),
            _ => None,
        }
    }

    /// Move to `Disconnected`, handing back the live connection if there was one.
    pub fn close(&mut self) -> Option<C> {
        match std::mem::replace(self, Self::Disconnected) {
            Self::Connected(conn) => Some(conn),
            _ => None,
        }
    }
}

/// Uniform access to one backend connection.
///
/// Every method that talks to the backend connects lazily. Mutating methods
/// take `&mut self`: one driver serves one caller at a time.
///
/// The quoting helpers work without a connection. A backend whose escaping
/// depends on session state refuses to escape text until it has connected;
/// [`Driver::escape`] connects first.
#[async_trait]
pub trait Driver: Send {
    /// Driver name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Quoting engine bound to this driver's rules.
    fn compiler(&self) -> Compiler<'_>;

    fn table_prefix(&self) -> &str;

    /// The last statement that completed successfully.
    fn last_query(&self) -> Option<&str>;

    fn set_profiler(&mut self, profiler: Arc<dyn Profiler>);

    fn is_connected(&self) -> bool;

    /// Normalized descriptor of a native column type.
    fn datatype(&self, type_name: &str) -> TypeDescriptor;

    async fn connect(&mut self) -> DbResult<()>;

    /// Close the connection. Returns `true` once no connection is held.
    async fn disconnect(&mut self) -> bool;

    async fn set_charset(&mut self, charset: &str) -> DbResult<()>;

    /// Execute a statement of the given kind.
    async fn perform(&mut self, kind: QueryType, sql: &str) -> DbResult<QueryResult>;

    async fn begin(&mut self, mode: Option<IsolationLevel>) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    async fn list_tables(&mut self, like: Option<&str>) -> DbResult<Vec<String>>;

    async fn list_columns(
        &mut self,
        table: &str,
        like: Option<&str>,
        add_prefix: bool,
    ) -> DbResult<ColumnMap>;

    /// Escape text into a complete literal for the live session.
    async fn escape(&mut self, value: &str) -> DbResult<String> {
        self.connect().await?;
        self.compiler().escape(value)
    }

    fn quote(&self, value: Value) -> DbResult<String> {
        self.compiler().quote_value(&value)
    }

    fn quote_identifier(&self, name: QualifiedName) -> DbResult<String> {
        self.compiler().quote_identifier(name)
    }

    fn quote_column(&self, name: QualifiedName) -> DbResult<String> {
        self.compiler().quote_column(name)
    }

    fn quote_table(&self, name: QualifiedName) -> DbResult<String> {
        self.compiler().quote_table(name)
    }

    /// Count the rows of a table.
    async fn count_records(&mut self, table: QualifiedName) -> DbResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS total_row_count FROM {}",
            self.quote_table(table)?
        );
        let rows = self.perform(QueryType::Select, &sql).await?.into_result_set()?;

        match rows.get("total_row_count") {
            Some(JsonValue::Number(n)) => n.as_u64(),
            Some(JsonValue::String(s)) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| DbError::decode(format!("no row count returned by [ {sql} ]")))
    }
}
