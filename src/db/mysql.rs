//! Native MySQL driver.
//!
//! Statements are sent unprepared over the text protocol, one connection per
//! driver. Session state that affects escaping (charset, SQL mode) is read
//! from the server when the connection is set up, and text is not escaped
//! before that.

use crate::config::DatabaseConfig;
use crate::db::compiler::{Compiler, Quoting};
use crate::db::decode::RowToJson;
use crate::db::driver::{ConnectionState, Driver};
use crate::db::escape::{MySqlEscaper, charset_literal};
use crate::db::profiler::{DATABASE_GROUP, Profiler, TracingProfiler};
use crate::db::schema::{self, queries};
use crate::db::types::TypeDescriptor;
use crate::error::{DbError, DbResult};
use crate::models::query::{IsolationLevel, QueryResult, QueryType, ResultSet};
use crate::models::schema::ColumnMap;
use crate::models::value::Value;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlQueryResult, MySqlRow};
use sqlx::{ConnectOptions, Connection, Executor, Row};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DRIVER_NAME: &str = "MySqlDriver";

/// MySQL driver.
///
/// ```ignore
/// let mut db = MySqlDriver::new(DatabaseConfig::from_url("mysql://app@localhost/shop")?)?;
/// let sql = format!("SELECT * FROM {}", db.compiler().quote_table("users")?);
/// let users = db.perform(QueryType::Select, &sql).await?.into_result_set()?;
/// ```
pub struct MySqlDriver {
    /// Credentials are taken out on the first connect
    config: DatabaseConfig,
    quoting: Quoting,
    escaper: MySqlEscaper,
    state: ConnectionState<MySqlConnection>,
    /// Built once from the credentials so a failed dial can be retried
    options: Option<MySqlConnectOptions>,
    current_database: Option<String>,
    last_query: Option<String>,
    profiler: Arc<dyn Profiler>,
}

impl fmt::Debug for MySqlDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlDriver")
            .field("config", &self.config)
            .field("quoting", &self.quoting)
            .field("connected", &self.state.is_connected())
            .field("current_database", &self.current_database)
            .field("last_query", &self.last_query)
            .finish_non_exhaustive()
    }
}

impl MySqlDriver {
    /// Create a driver. No connection is made until one is needed.
    pub fn new(config: DatabaseConfig) -> DbResult<Self> {
        let quoting = config.quoting(Some('`'))?;
        let escaper = MySqlEscaper::new(config.charset.clone());
        Ok(Self {
            config,
            quoting,
            escaper,
            state: ConnectionState::Unconnected,
            options: None,
            current_database: None,
            last_query: None,
            profiler: Arc::new(TracingProfiler::new()),
        })
    }

    /// The retained configuration (credentials removed once connected).
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The database the session last selected.
    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    /// Select the default database of the session.
    pub async fn select_database(&mut self, database: &str) -> DbResult<()> {
        self.connect().await?;
        let sql = format!("USE {}", self.quoting.wrap(database));
        execute(self.live()?, &sql)
            .await
            .map_err(DbError::connection_from)?;
        debug!(database = %database, "Selected database");
        self.current_database = Some(database.to_string());
        Ok(())
    }

    /// Take the credentials out of the configuration and build connect options.
    fn connect_options(&mut self) -> DbResult<MySqlConnectOptions> {
        let settings = &mut self.config.connection;
        let dsn = settings.dsn.take();
        let username = settings.username.take();
        let password = settings.password.take();

        let mut options = match dsn {
            Some(dsn) => MySqlConnectOptions::from_str(&dsn).map_err(DbError::connection_from)?,
            None => MySqlConnectOptions::new(),
        };
        if let Some(host) = &settings.hostname {
            options = options.host(host);
        }
        if let Some(port) = settings.port {
            options = options.port(port);
        }
        if let Some(username) = username {
            options = options.username(&username);
        }
        if let Some(password) = password {
            options = options.password(&password);
        }
        Ok(options)
    }

    /// Select the database and charset, then apply the session variables.
    ///
    /// Variable values are literals, so the SQL mode is read before they are
    /// quoted and again after they are applied.
    async fn prepare_session(&mut self, conn: &mut MySqlConnection) -> DbResult<()> {
        if let Some(database) = self.config.connection.database.clone() {
            let sql = format!("USE {}", self.quoting.wrap(&database));
            execute(conn, &sql).await.map_err(DbError::connection_from)?;
            self.current_database = Some(database);
        }

        if let Some(charset) = self.config.charset.clone() {
            let sql = format!("SET NAMES {}", charset_literal(&charset)?);
            execute(conn, &sql).await.map_err(DbError::connection_from)?;
        }

        self.read_session_state(conn).await?;

        let assignments = {
            let compiler = self.compiler();
            session_assignments(&compiler, &self.config.connection.variables)
                .map_err(|e| DbError::connection(None, e.to_string()))?
        };
        if let Some(sql) = assignments {
            execute(conn, &sql).await.map_err(DbError::connection_from)?;
            self.read_session_state(conn).await?;
        }

        Ok(())
    }

    /// Capture the SQL mode and connection charset the escaper depends on.
    async fn read_session_state(&mut self, conn: &mut MySqlConnection) -> DbResult<()> {
        let rows = fetch_all(conn, queries::mysql::SESSION_STATE)
            .await
            .map_err(DbError::connection_from)?;
        let column = |idx: usize| {
            rows.first()
                .and_then(|row| row.try_get_unchecked::<Option<String>, _>(idx).ok().flatten())
        };

        let sql_mode = column(0).unwrap_or_default();
        self.escaper.set_sql_mode(&sql_mode);
        if let Some(charset) = column(1) {
            self.escaper.set_charset(charset);
        }
        debug!(
            sql_mode = %sql_mode,
            charset = ?self.escaper.charset(),
            "Session state read"
        );
        Ok(())
    }

    fn live(&mut self) -> DbResult<&mut MySqlConnection> {
        self.state
            .connection()
            .ok_or_else(|| DbError::connection(None, "not connected"))
    }

    /// The configured database, when a persistent session has moved away from it.
    fn reselect_target(&self) -> Option<String> {
        if !self.config.connection.persistent {
            return None;
        }
        self.config
            .connection
            .database
            .clone()
            .filter(|database| self.current_database.as_deref() != Some(database.as_str()))
    }

    async fn reselect_database(&mut self) -> DbResult<()> {
        if let Some(database) = self.reselect_target() {
            debug!(database = %database, "Re-selecting configured database");
            self.select_database(&database).await?;
        }
        Ok(())
    }

    /// Execute through the profiler, recording the statement on success.
    async fn run(
        &mut self,
        kind: QueryType,
        sql: &str,
        decode_binary: bool,
    ) -> DbResult<QueryResult> {
        self.connect().await?;
        self.reselect_database().await?;

        let Some(conn) = self.state.connection() else {
            return Err(DbError::connection(None, "not connected"));
        };
        let token = self.profiler.start(DATABASE_GROUP, sql);

        match run_statement(conn, kind, sql, decode_binary).await {
            Ok(result) => {
                self.profiler.stop(token);
                self.last_query = Some(sql.to_string());
                if is_use_statement(sql) {
                    self.current_database = selected_database(conn).await?;
                }
                Ok(result)
            }
            Err(e) => {
                self.profiler.discard(token);
                debug!(error = %e, sql = %sql, "Statement failed");
                Err(DbError::query_from(e, sql))
            }
        }
    }

    async fn transaction_statement(&mut self, sql: &str) -> DbResult<()> {
        self.connect().await?;
        execute(self.live()?, sql)
            .await
            .map_err(DbError::transaction_from)?;
        debug!(sql = %sql, "Transaction control");
        Ok(())
    }
}

async fn execute(conn: &mut MySqlConnection, sql: &str) -> Result<MySqlQueryResult, sqlx::Error> {
    conn.execute(sql).await
}

async fn fetch_all(conn: &mut MySqlConnection, sql: &str) -> Result<Vec<MySqlRow>, sqlx::Error> {
    conn.fetch_all(sql).await
}

/// `SET SESSION` statement for the configured variables, in name order.
pub(crate) fn session_assignments(
    compiler: &Compiler<'_>,
    variables: &BTreeMap<String, JsonValue>,
) -> DbResult<Option<String>> {
    if variables.is_empty() {
        return Ok(None);
    }
    let assignments = variables
        .iter()
        .map(|(name, value)| {
            Ok(format!(
                "SESSION {} = {}",
                name,
                compiler.quote_value(&Value::from(value.clone()))?
            ))
        })
        .collect::<DbResult<Vec<_>>>()?;
    Ok(Some(format!("SET {}", assignments.join(", "))))
}

/// Whether a statement switches the default database.
fn is_use_statement(sql: &str) -> bool {
    let sql = sql.trim_start();
    sql.get(..3).is_some_and(|keyword| keyword.eq_ignore_ascii_case("use"))
        && sql[3..].starts_with(|c: char| c.is_whitespace() || c == '`')
}

async fn selected_database(conn: &mut MySqlConnection) -> DbResult<Option<String>> {
    let rows = fetch_all(conn, queries::mysql::CURRENT_DATABASE)
        .await
        .map_err(|e| DbError::query_from(e, queries::mysql::CURRENT_DATABASE))?;
    Ok(rows
        .first()
        .and_then(|row| row.try_get_unchecked::<Option<String>, _>(0).ok().flatten()))
}

async fn run_statement(
    conn: &mut MySqlConnection,
    kind: QueryType,
    sql: &str,
    decode_binary: bool,
) -> Result<QueryResult, sqlx::Error> {
    match kind {
        QueryType::Select => {
            let rows = fetch_all(conn, sql).await?;
            let rows = rows
                .iter()
                .map(|row| row.to_json_map_with_options(decode_binary))
                .collect();
            Ok(QueryResult::Select(ResultSet::new(sql, rows)))
        }
        QueryType::Insert => {
            let done = execute(conn, sql).await?;
            Ok(QueryResult::Insert {
                insert_id: Some(done.last_insert_id()).filter(|id| *id != 0),
                affected_rows: done.rows_affected(),
            })
        }
        QueryType::Update | QueryType::Delete => {
            let done = execute(conn, sql).await?;
            Ok(QueryResult::Affected(done.rows_affected()))
        }
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.quoting, &self.escaper)
    }

    fn table_prefix(&self) -> &str {
        &self.quoting.table_prefix
    }

    fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    fn set_profiler(&mut self, profiler: Arc<dyn Profiler>) {
        self.profiler = profiler;
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn datatype(&self, type_name: &str) -> TypeDescriptor {
        schema::mysql_datatype(type_name)
    }

    async fn connect(&mut self) -> DbResult<()> {
        match self.state {
            ConnectionState::Connected(_) => return Ok(()),
            ConnectionState::Disconnected => {
                return Err(DbError::connection(None, "connection has been closed"));
            }
            ConnectionState::Unconnected => {}
        }

        let options = match &self.options {
            Some(options) => options.clone(),
            None => {
                let options = self.connect_options()?;
                self.options = Some(options.clone());
                options
            }
        };

        debug!(
            host = ?self.config.connection.hostname,
            database = ?self.config.connection.database,
            "Connecting to MySQL"
        );
        let mut conn = options.connect().await.map_err(|e| {
            warn!(error = %e, "MySQL connection failed");
            DbError::connection_from(e)
        })?;

        if let Err(e) = self.prepare_session(&mut conn).await {
            warn!(error = %e, "MySQL session setup failed");
            if let Err(close_err) = conn.close().await {
                debug!(error = %close_err, "Error closing half-open connection");
            }
            self.current_database = None;
            self.escaper.reset();
            return Err(e);
        }

        self.state = ConnectionState::Connected(conn);
        info!(
            database = ?self.current_database,
            no_backslash_escapes = ?self.escaper.no_backslash_escapes(),
            "Connected to MySQL"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> bool {
        self.current_database = None;
        self.escaper.reset();
        match self.state.close() {
            Some(conn) => match conn.close().await {
                Ok(()) => {
                    info!("Disconnected from MySQL");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Error closing MySQL connection");
                    false
                }
            },
            None => true,
        }
    }

    async fn set_charset(&mut self, charset: &str) -> DbResult<()> {
        self.connect().await?;
        let sql = format!("SET NAMES {}", charset_literal(charset)?);
        execute(self.live()?, &sql)
            .await
            .map_err(DbError::connection_from)?;
        self.escaper.set_charset(charset);
        debug!(charset = %charset, "Charset set");
        Ok(())
    }

    async fn perform(&mut self, kind: QueryType, sql: &str) -> DbResult<QueryResult> {
        let decode_binary = self.config.decode_binary;
        self.run(kind, sql, decode_binary).await
    }

    async fn begin(&mut self, mode: Option<IsolationLevel>) -> DbResult<()> {
        if let Some(mode) = mode {
            self.transaction_statement(&format!("SET TRANSACTION ISOLATION LEVEL {mode}"))
                .await?;
        }
        self.transaction_statement("START TRANSACTION").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.transaction_statement("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.transaction_statement("ROLLBACK").await
    }

    async fn list_tables(&mut self, like: Option<&str>) -> DbResult<Vec<String>> {
        self.connect().await?;
        let sql = match like {
            Some(like) => format!(
                "{} LIKE {}",
                queries::mysql::SHOW_TABLES,
                self.compiler().escape(like)?
            ),
            None => queries::mysql::SHOW_TABLES.to_string(),
        };
        let rows = self.run(QueryType::Select, &sql, true).await?.into_result_set()?;
        Ok(schema::table_names(rows))
    }

    async fn list_columns(
        &mut self,
        table: &str,
        like: Option<&str>,
        add_prefix: bool,
    ) -> DbResult<ColumnMap> {
        self.connect().await?;
        let table = if add_prefix {
            self.compiler().quote_table(table)?
        } else {
            table.to_string()
        };
        let sql = match like {
            Some(like) => format!(
                "{} {} LIKE {}",
                queries::mysql::SHOW_FULL_COLUMNS,
                table,
                self.compiler().escape(like)?
            ),
            None => format!("{} {}", queries::mysql::SHOW_FULL_COLUMNS, table),
        };
        let rows = self.run(QueryType::Select, &sql, true).await?.into_result_set()?;
        schema::mysql_columns(rows)
    }
}
