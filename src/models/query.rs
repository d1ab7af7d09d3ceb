//! Query-related data models.
//!
//! This module defines statement kinds, execution results and the buffered
//! result set returned by SELECT statements.

use crate::db::compiler::Compiler;
use crate::db::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::models::expression::Compile;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// A result row: column name to value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Statement kind. Decides the shape of [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    /// DELETE and any other statement reporting affected rows
    Delete,
}

impl QueryType {
    /// Guess the statement kind from its leading keyword.
    pub fn detect(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match keyword.as_str() {
            "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH" | "PRAGMA"
            | "VALUES" => Self::Select,
            "INSERT" | "REPLACE" => Self::Insert,
            "UPDATE" => Self::Update,
            _ => Self::Delete,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Transaction isolation level for [`Driver::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Outcome of [`Driver::perform`].
#[derive(Debug, Clone)]
pub enum QueryResult {
    Select(ResultSet),
    Insert {
        /// None when the statement generated no id
        insert_id: Option<u64>,
        affected_rows: u64,
    },
    Affected(u64),
}

impl QueryResult {
    /// Take the rows of a SELECT result.
    pub fn into_result_set(self) -> DbResult<ResultSet> {
        match self {
            Self::Select(rows) => Ok(rows),
            _ => Err(DbError::invalid_input("statement did not return a result set")),
        }
    }

    /// Number of affected rows for INSERT and other write statements.
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Select(_) => None,
            Self::Insert { affected_rows, .. } => Some(*affected_rows),
            Self::Affected(n) => Some(*n),
        }
    }

    pub fn insert_id(&self) -> Option<u64> {
        match self {
            Self::Insert { insert_id, .. } => *insert_id,
            _ => None,
        }
    }
}

/// A type that can be built from a row plus caller-supplied construction
/// parameters.
pub trait FromRow: Sized {
    type Params: ?Sized;

    fn from_row(row: Row, params: &Self::Params) -> DbResult<Self>;
}

/// Buffered rows of a SELECT statement.
///
/// Rows are fetched eagerly; iteration is forward-only via `IntoIterator`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    #[serde(skip)]
    sql: String,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(sql: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            sql: sql.into(),
            rows,
        }
    }

    /// The statement that produced these rows.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// A column of the first row.
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.rows.first().and_then(|row| row.get(column))
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Vec<&JsonValue> {
        self.rows.iter().filter_map(|row| row.get(name)).collect()
    }

    /// Rows as generic objects.
    pub fn into_objects(self) -> impl Iterator<Item = JsonValue> {
        self.rows.into_iter().map(JsonValue::Object)
    }

    /// Rows deserialized into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> impl Iterator<Item = DbResult<T>> {
        self.rows.into_iter().map(|row| {
            serde_json::from_value(JsonValue::Object(row)).map_err(|e| DbError::decode(e.to_string()))
        })
    }

    /// Rows constructed as `T` with the given construction parameters.
    pub fn construct<T: FromRow>(
        self,
        params: &T::Params,
    ) -> impl Iterator<Item = DbResult<T>> + '_ {
        self.rows.into_iter().map(move |row| T::from_row(row, params))
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A raw statement of a known kind.
///
/// Executes through any driver and composes into other statements as a
/// sub-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    kind: QueryType,
    sql: String,
}

impl Query {
    pub fn new(kind: QueryType, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
        }
    }

    pub fn kind(&self) -> QueryType {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub async fn execute<D: Driver + ?Sized>(&self, driver: &mut D) -> DbResult<QueryResult> {
        driver.perform(self.kind, &self.sql).await
    }
}

impl Compile for Query {
    fn compile(&self, _compiler: &Compiler<'_>) -> DbResult<String> {
        Ok(self.sql.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> ResultSet {
        let rows = vec![
            json!({"id": 1, "name": "ann"}),
            json!({"id": 2, "name": "bob"}),
        ]
        .into_iter()
        .filter_map(|v| match v {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect();
        ResultSet::new("SELECT id, name FROM users", rows)
    }

    #[test]
    fn test_detect_query_type() {
        assert_eq!(QueryType::detect("select 1"), QueryType::Select);
        assert_eq!(QueryType::detect("  SHOW TABLES"), QueryType::Select);
        assert_eq!(QueryType::detect("(SELECT 1) UNION (SELECT 2)"), QueryType::Select);
        assert_eq!(QueryType::detect("INSERT INTO t VALUES (1)"), QueryType::Insert);
        assert_eq!(QueryType::detect("update t set a = 1"), QueryType::Update);
        assert_eq!(QueryType::detect("DELETE FROM t"), QueryType::Delete);
        assert_eq!(QueryType::detect("CREATE TABLE t (a INT)"), QueryType::Delete);
    }

    #[test]
    fn test_result_set_accessors() {
        let rows = sample();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get("name"), Some(&json!("ann")));
        assert_eq!(rows.column("id"), vec![&json!(1), &json!(2)]);
        assert_eq!(rows.sql(), "SELECT id, name FROM users");
    }

    #[test]
    fn test_result_set_preserves_column_order() {
        let rows = sample();
        let keys: Vec<&String> = rows.rows()[0].keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
    }

    #[test]
    fn test_deserialize_rows() {
        #[derive(Deserialize)]
        struct User {
            id: i64,
            name: String,
        }
        let users: Vec<User> = sample().deserialize().collect::<DbResult<_>>().unwrap();
        assert_eq!(users[1].id, 2);
        assert_eq!(users[1].name, "bob");
    }

    #[test]
    fn test_construct_rows_with_params() {
        struct Tagged {
            label: String,
        }
        impl FromRow for Tagged {
            type Params = str;
            fn from_row(row: Row, params: &str) -> DbResult<Self> {
                let name = row
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| DbError::decode("missing name"))?;
                Ok(Self {
                    label: format!("{params}:{name}"),
                })
            }
        }
        let tagged: Vec<Tagged> = sample()
            .construct::<Tagged>("user")
            .collect::<DbResult<_>>()
            .unwrap();
        assert_eq!(tagged[0].label, "user:ann");
    }

    #[test]
    fn test_query_result_shapes() {
        let insert = QueryResult::Insert {
            insert_id: Some(7),
            affected_rows: 1,
        };
        assert_eq!(insert.insert_id(), Some(7));
        assert_eq!(insert.affected_rows(), Some(1));
        assert!(QueryResult::Affected(3).into_result_set().is_err());
        assert_eq!(QueryResult::Select(sample()).affected_rows(), None);
    }
}
