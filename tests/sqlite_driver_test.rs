//! Integration tests for the DSN driver against SQLite.
//!
//! Tests verify that:
//! - Statements run and return the result shape of their kind
//! - Only successful statements become the last query
//! - Failed statements discard their profiler scope
//! - Transactions commit and roll back
//! - Disconnect is idempotent and terminal

use pretty_assertions::assert_eq;
use rdb::db::{AnyDriver, Driver, ProfileToken, Profiler};
use rdb::models::{IsolationLevel, Query, QueryResult, QueryType, SubQuery, Value};
use rdb::{DatabaseConfig, DbError};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records profiler calls as `start:<sql>`, `stop:<id>` and `discard:<id>`.
#[derive(Default)]
struct RecordingProfiler {
    next_id: AtomicU64,
    events: Mutex<Vec<String>>,
}

impl RecordingProfiler {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Profiler for RecordingProfiler {
    fn start(&self, group: &str, statement: &str) -> ProfileToken {
        let token = ProfileToken::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{group}:{statement}"));
        token
    }

    fn stop(&self, token: ProfileToken) {
        self.events.lock().unwrap().push(format!("stop:{}", token.id()));
    }

    fn discard(&self, token: ProfileToken) {
        self.events
            .lock()
            .unwrap()
            .push(format!("discard:{}", token.id()));
    }
}

/// An in-memory database with a `users` table behind the given URL options.
async fn setup_db(options: &str) -> AnyDriver {
    let config = DatabaseConfig::from_url(&format!("sqlite::memory:{options}")).unwrap();
    let mut db = AnyDriver::new(config).unwrap();
    let table = db.compiler().quote_table("users").unwrap();
    db.perform(
        QueryType::Delete,
        &format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)"),
    )
    .await
    .unwrap();
    db
}

#[tokio::test]
async fn test_insert_select_update_delete() {
    let mut db = setup_db("").await;

    let sql = format!(
        "INSERT INTO users (name, age) VALUES ({}, {})",
        db.compiler().quote("ann").unwrap(),
        db.compiler().quote(31).unwrap()
    );
    let result = db.perform(QueryType::Insert, &sql).await.unwrap();
    assert_eq!(result.insert_id(), Some(1));
    assert_eq!(result.affected_rows(), Some(1));

    db.perform(
        QueryType::Insert,
        "INSERT INTO users (name, age) VALUES ('bob', NULL)",
    )
    .await
    .unwrap();

    let rows = db
        .perform(QueryType::Select, "SELECT id, name, age FROM users ORDER BY id")
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.len(), 2);
    let first: Vec<&String> = rows.rows()[0].keys().collect();
    assert_eq!(first, vec!["id", "name", "age"]);
    assert_eq!(rows.column("name"), vec![&json!("ann"), &json!("bob")]);
    assert_eq!(rows.rows()[1]["age"], json!(null));

    let result = db
        .perform(QueryType::Update, "UPDATE users SET age = 40")
        .await
        .unwrap();
    assert!(matches!(result, QueryResult::Affected(2)));

    let result = db
        .perform(QueryType::Delete, "DELETE FROM users WHERE name = 'bob'")
        .await
        .unwrap();
    assert_eq!(result.affected_rows(), Some(1));
}

#[tokio::test]
async fn test_rows_deserialize() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    let mut db = setup_db("").await;
    db.perform(QueryType::Insert, "INSERT INTO users (name) VALUES ('ann')")
        .await
        .unwrap();

    let users: Vec<User> = db
        .perform(QueryType::Select, "SELECT id, name FROM users")
        .await
        .unwrap()
        .into_result_set()
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        users,
        vec![User {
            id: 1,
            name: "ann".to_string()
        }]
    );
}

#[tokio::test]
async fn test_quoted_text_round_trips() {
    let mut db = setup_db("").await;
    let name = "O'Brien \\ \"quoted\" -- not a comment";
    let sql = format!(
        "INSERT INTO users (name) VALUES ({})",
        db.compiler().quote(name).unwrap()
    );
    db.perform(QueryType::Insert, &sql).await.unwrap();

    let rows = db
        .perform(QueryType::Select, "SELECT name FROM users")
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.get("name"), Some(&json!(name)));
}

#[tokio::test]
async fn test_computed_columns_keep_their_values() {
    let mut db = setup_db("").await;
    let rows = db
        .perform(
            QueryType::Select,
            "SELECT 1 + 1 AS two, 1.5 * 2 AS three, 'a' || 'b' AS ab, NULL AS nothing",
        )
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.get("two"), Some(&json!(2)));
    assert_eq!(rows.get("three"), Some(&json!(3.0)));
    assert_eq!(rows.get("ab"), Some(&json!("ab")));
    assert_eq!(rows.get("nothing"), Some(&json!(null)));
}

#[tokio::test]
async fn test_escape_connects_first() {
    let config = DatabaseConfig::from_url("sqlite::memory:").unwrap();
    let mut db = AnyDriver::new(config).unwrap();
    assert!(!db.is_connected());
    assert_eq!(db.escape("it's").await.unwrap(), "'it''s'");
    assert!(db.is_connected());
}

#[tokio::test]
async fn test_nul_byte_cannot_be_escaped() {
    let db = setup_db("").await;
    let err = db.compiler().quote("a\0b").unwrap_err();
    assert!(matches!(err, DbError::Escape { .. }));
}

#[tokio::test]
async fn test_last_query_only_records_success() {
    let mut db = setup_db("").await;
    db.perform(QueryType::Select, "SELECT 1").await.unwrap();
    assert_eq!(db.last_query(), Some("SELECT 1"));

    let err = db
        .perform(QueryType::Select, "SELECT * FROM missing")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
    assert_eq!(err.sql(), Some("SELECT * FROM missing"));
    assert!(err.to_string().contains("missing"));
    assert_eq!(db.last_query(), Some("SELECT 1"));
}

#[tokio::test]
async fn test_profiler_stops_or_discards() {
    let mut db = setup_db("").await;
    let profiler = Arc::new(RecordingProfiler::default());
    db.set_profiler(profiler.clone());

    db.perform(QueryType::Select, "SELECT 1").await.unwrap();
    let _ = db.perform(QueryType::Select, "SELEC 1").await;

    assert_eq!(
        profiler.events(),
        vec![
            "start:Database:SELECT 1".to_string(),
            "stop:0".to_string(),
            "start:Database:SELEC 1".to_string(),
            "discard:1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let mut db = setup_db("").await;

    db.begin(None).await.unwrap();
    db.perform(QueryType::Insert, "INSERT INTO users (name) VALUES ('kept')")
        .await
        .unwrap();
    db.commit().await.unwrap();

    db.begin(Some(IsolationLevel::Serializable)).await.unwrap();
    db.perform(QueryType::Insert, "INSERT INTO users (name) VALUES ('dropped')")
        .await
        .unwrap();
    db.rollback().await.unwrap();

    let rows = db
        .perform(QueryType::Select, "SELECT name FROM users")
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.column("name"), vec![&json!("kept")]);
}

#[tokio::test]
async fn test_commit_without_transaction_fails() {
    let mut db = setup_db("").await;
    let err = db.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
}

#[tokio::test]
async fn test_count_records_applies_prefix() {
    let mut db = setup_db("?table_prefix=app_").await;
    for name in ["a", "b", "c"] {
        let sql = format!(
            "INSERT INTO {} (name) VALUES ({})",
            db.compiler().quote_table("users").unwrap(),
            db.compiler().quote(name).unwrap()
        );
        db.perform(QueryType::Insert, &sql).await.unwrap();
    }

    assert_eq!(db.count_records("users".into()).await.unwrap(), 3);
    assert_eq!(
        db.last_query(),
        Some("SELECT COUNT(*) AS total_row_count FROM app_users")
    );
}

#[tokio::test]
async fn test_identifier_character_from_config() {
    let mut db = setup_db("?identifier=%22").await;
    assert_eq!(
        db.compiler().quote_column(("users.name", "n")).unwrap(),
        "\"users\".\"name\" AS \"n\""
    );
    db.perform(QueryType::Insert, "INSERT INTO \"users\" (name) VALUES ('x')")
        .await
        .unwrap();
    let sql = format!(
        "SELECT {} FROM {}",
        db.compiler().quote_column(("users.name", "n")).unwrap(),
        db.compiler().quote_table("users").unwrap()
    );
    let rows = db
        .perform(QueryType::Select, &sql)
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.get("n"), Some(&json!("x")));
}

#[tokio::test]
async fn test_sub_query_in_value_position() {
    let mut db = setup_db("").await;
    db.perform(
        QueryType::Insert,
        "INSERT INTO users (name, age) VALUES ('ann', 30), ('bob', 50)",
    )
    .await
    .unwrap();

    let oldest = SubQuery::new(Query::new(QueryType::Select, "SELECT MAX(age) FROM users"));
    let sql = format!(
        "SELECT name FROM users WHERE age = {}",
        db.compiler().quote(Value::from(oldest)).unwrap()
    );
    assert_eq!(
        sql,
        "SELECT name FROM users WHERE age = (SELECT MAX(age) FROM users)"
    );
    let rows = Query::new(QueryType::Select, sql)
        .execute(&mut db)
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.get("name"), Some(&json!("bob")));
}

#[tokio::test]
async fn test_session_pragmas_applied() {
    let mut db = setup_db("?var.foreign_keys=true").await;
    let rows = db
        .perform(QueryType::Select, "PRAGMA foreign_keys")
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rows.get("foreign_keys"), Some(&json!(1)));
}

#[tokio::test]
async fn test_introspection_unsupported() {
    let mut db = setup_db("").await;
    let err = db.list_tables(None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Database method list_tables is not supported by AnyDriver"
    );
    assert!(matches!(
        db.list_columns("users", None, true).await,
        Err(DbError::Unsupported {
            operation: "list_columns",
            ..
        })
    ));
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_terminal() {
    let mut db = setup_db("").await;
    assert!(db.is_connected());
    assert!(db.disconnect().await);
    assert!(!db.is_connected());
    assert!(db.disconnect().await);

    let err = db.perform(QueryType::Select, "SELECT 1").await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("app.db").display());

    let mut db = AnyDriver::new(DatabaseConfig::from_url(&url).unwrap()).unwrap();
    db.perform(QueryType::Delete, "CREATE TABLE notes (body TEXT)")
        .await
        .unwrap();
    db.perform(QueryType::Insert, "INSERT INTO notes VALUES ('hello')")
        .await
        .unwrap();
    assert!(db.disconnect().await);

    let mut db = AnyDriver::new(DatabaseConfig::from_url(&url).unwrap()).unwrap();
    assert_eq!(db.count_records("notes".into()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_connect_failure_leaves_driver_unconnected() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("absent.db").display());

    let mut db = AnyDriver::new(DatabaseConfig::from_url(&url).unwrap()).unwrap();
    let err = db.connect().await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(!db.is_connected());
    // The configured DSN is consumed, the retry reuses the prepared URL
    assert!(db.config().connection.dsn.is_none());
    assert!(matches!(db.connect().await, Err(DbError::Connection { .. })));
}
