//! Error types for the database client.
//!
//! Every backend failure surfaces as one of the [`DbError`] variants below, always
//! carrying the backend's native code and message so the failing statement can be
//! reproduced. Nothing in this crate retries.

use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection {
        /// Native error code (MySQL errno or SQLSTATE)
        code: Option<String>,
        message: String,
    },

    #[error("Query failed: {message} [ {sql} ]")]
    Query {
        code: Option<String>,
        message: String,
        /// The statement that failed
        sql: String,
    },

    #[error("Transaction failed: {message}")]
    Transaction {
        code: Option<String>,
        message: String,
    },

    #[error("Escape failed: {message}")]
    Escape { message: String },

    #[error("Database method {operation} is not supported by {driver}")]
    Unsupported {
        operation: &'static str,
        driver: &'static str,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },
}

impl DbError {
    /// Create a connection error.
    pub fn connection(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            code,
            message: message.into(),
        }
    }

    /// Create a query error for the given statement.
    pub fn query(code: Option<String>, message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            code,
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Transaction {
            code,
            message: message.into(),
        }
    }

    /// Create an escape error.
    pub fn escape(message: impl Into<String>) -> Self {
        Self::Escape {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: &'static str, driver: &'static str) -> Self {
        Self::Unsupported { operation, driver }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Wrap a driver failure raised while connecting or configuring the session.
    pub fn connection_from(err: sqlx::Error) -> Self {
        let (code, message) = native_parts(&err);
        Self::connection(code, message)
    }

    /// Wrap a driver failure raised while executing `sql`.
    pub fn query_from(err: sqlx::Error, sql: &str) -> Self {
        let (code, message) = native_parts(&err);
        Self::query(code, message, sql)
    }

    /// Wrap a driver failure raised by transaction control.
    pub fn transaction_from(err: sqlx::Error) -> Self {
        let (code, message) = native_parts(&err);
        Self::transaction(code, message)
    }

    /// The native error code, when the backend reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Connection { code, .. }
            | Self::Query { code, .. }
            | Self::Transaction { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The offending statement of a query error.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Extract the native code and message from a driver error.
///
/// MySQL errors report their numeric errno; other backends report SQLSTATE.
fn native_parts(err: &sqlx::Error) -> (Option<String>, String) {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number().to_string())
                .or_else(|| db_err.code().map(|c| c.to_string()));
            (code, db_err.message().to_string())
        }
        sqlx::Error::Io(io_err) => (None, format!("I/O error: {}", io_err)),
        sqlx::Error::Tls(tls_err) => (None, format!("TLS error: {}", tls_err)),
        sqlx::Error::Protocol(msg) => (None, format!("Protocol error: {}", msg)),
        other => (None, other.to_string()),
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
