//! Row decoding into ordered JSON maps.
//!
//! Every column is decoded by the [`ColumnKind`] its native type name maps to.
//! Columns that carry no type (computed columns read through `sqlx::any`, such
//! as `COUNT(*)` or a `PRAGMA` result on SQLite) are read by trying integer,
//! float, text, then bytes.
//!
//! MySQL statements run over the text protocol, so values without a dedicated
//! decoder (dates, times, bit strings) arrive as text and are read unchecked.

use crate::models::query::Row as RowMap;
use serde_json::Value as JsonValue;
use sqlx::any::AnyRow;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};
use tracing::warn;

/// How a column is decoded, from its native type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    /// Kept as its exact text
    Decimal,
    Boolean,
    Binary,
    Json,
    Text,
    /// No declared type; decoded by trying each value type
    Untyped,
}

impl ColumnKind {
    pub fn of(type_name: &str) -> Self {
        let lower = type_name.to_ascii_lowercase();
        let base = lower.split_whitespace().next().unwrap_or_default();
        match base {
            "null" => Self::Untyped,
            "bool" | "boolean" => Self::Boolean,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" => Self::Integer,
            "float" | "double" | "real" | "float4" | "float8" => Self::Float,
            "decimal" | "numeric" => Self::Decimal,
            "json" | "jsonb" => Self::Json,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob"
            | "bytea" => Self::Binary,
            _ => Self::Text,
        }
    }
}

/// Exact text of a MySQL DECIMAL column.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        ColumnKind::of(ty.name()) == ColumnKind::Decimal
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary data as JSON: UTF-8 text when asked for and valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(text) if decode_binary => JsonValue::String(text.to_string()),
        _ => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Typed column access of one backend's rows.
trait ColumnReader {
    fn signed(&self, idx: usize) -> sqlx::Result<Option<i64>>;

    fn unsigned(&self, _idx: usize) -> sqlx::Result<Option<u64>> {
        Ok(None)
    }

    fn float(&self, idx: usize) -> sqlx::Result<Option<f64>>;
    fn boolean(&self, idx: usize) -> sqlx::Result<Option<bool>>;
    fn text(&self, idx: usize) -> sqlx::Result<Option<String>>;
    fn bytes(&self, idx: usize) -> sqlx::Result<Option<Vec<u8>>>;

    fn decimal(&self, idx: usize) -> sqlx::Result<Option<String>> {
        self.text(idx)
    }

    fn json(&self, idx: usize) -> sqlx::Result<Option<JsonValue>> {
        Ok(self.text(idx)?.map(JsonValue::String))
    }
}

impl ColumnReader for MySqlRow {
    fn signed(&self, idx: usize) -> sqlx::Result<Option<i64>> {
        self.try_get(idx)
    }

    fn unsigned(&self, idx: usize) -> sqlx::Result<Option<u64>> {
        self.try_get(idx)
    }

    fn float(&self, idx: usize) -> sqlx::Result<Option<f64>> {
        self.try_get::<Option<f64>, _>(idx)
            .or_else(|_| Ok(self.try_get::<Option<f32>, _>(idx)?.map(f64::from)))
    }

    fn boolean(&self, idx: usize) -> sqlx::Result<Option<bool>> {
        self.try_get(idx)
    }

    fn text(&self, idx: usize) -> sqlx::Result<Option<String>> {
        self.try_get(idx)
            .or_else(|_| self.try_get_unchecked::<Option<String>, _>(idx))
    }

    fn bytes(&self, idx: usize) -> sqlx::Result<Option<Vec<u8>>> {
        self.try_get(idx)
    }

    fn decimal(&self, idx: usize) -> sqlx::Result<Option<String>> {
        Ok(self.try_get::<Option<RawDecimal>, _>(idx)?.map(|d| d.0))
    }

    fn json(&self, idx: usize) -> sqlx::Result<Option<JsonValue>> {
        self.try_get(idx)
    }
}

impl ColumnReader for AnyRow {
    fn signed(&self, idx: usize) -> sqlx::Result<Option<i64>> {
        self.try_get(idx)
    }

    fn float(&self, idx: usize) -> sqlx::Result<Option<f64>> {
        self.try_get::<Option<f64>, _>(idx)
            .or_else(|_| Ok(self.try_get::<Option<f32>, _>(idx)?.map(f64::from)))
    }

    fn boolean(&self, idx: usize) -> sqlx::Result<Option<bool>> {
        self.try_get(idx)
    }

    fn text(&self, idx: usize) -> sqlx::Result<Option<String>> {
        self.try_get(idx)
    }

    fn bytes(&self, idx: usize) -> sqlx::Result<Option<Vec<u8>>> {
        self.try_get(idx)
    }

    fn decimal(&self, idx: usize) -> sqlx::Result<Option<String>> {
        self.text(idx)
            .or_else(|_| Ok(self.float(idx)?.map(|f| f.to_string())))
    }
}

fn or_null<T>(value: Option<T>, to_json: impl FnOnce(T) -> JsonValue) -> JsonValue {
    value.map_or(JsonValue::Null, to_json)
}

fn decode_column<R: ColumnReader>(
    row: &R,
    idx: usize,
    kind: ColumnKind,
    decode_binary: bool,
) -> sqlx::Result<JsonValue> {
    let value = match kind {
        ColumnKind::Integer => match row.signed(idx) {
            Ok(v) => or_null(v, JsonValue::from),
            Err(_) => or_null(row.unsigned(idx)?, JsonValue::from),
        },
        ColumnKind::Float => or_null(row.float(idx)?, float_value),
        ColumnKind::Decimal => or_null(row.decimal(idx)?, JsonValue::String),
        ColumnKind::Boolean => or_null(row.boolean(idx)?, JsonValue::Bool),
        ColumnKind::Binary => or_null(row.bytes(idx)?, |b| decode_binary_value(&b, decode_binary)),
        ColumnKind::Json => row.json(idx)?.unwrap_or(JsonValue::Null),
        ColumnKind::Text => or_null(row.text(idx)?, JsonValue::String),
        ColumnKind::Untyped => sniff_column(row, idx, decode_binary),
    };
    Ok(value)
}

fn sniff_column<R: ColumnReader>(row: &R, idx: usize, decode_binary: bool) -> JsonValue {
    if let Ok(v) = row.signed(idx) {
        return or_null(v, JsonValue::from);
    }
    if let Ok(v) = row.float(idx) {
        return or_null(v, float_value);
    }
    if let Ok(v) = row.text(idx) {
        return or_null(v, JsonValue::String);
    }
    match row.bytes(idx) {
        Ok(v) => or_null(v, |b| decode_binary_value(&b, decode_binary)),
        Err(e) => {
            warn!(column = idx, error = %e, "Undecodable column");
            JsonValue::Null
        }
    }
}

fn row_to_map<R>(row: &R, decode_binary: bool) -> RowMap
where
    R: Row + ColumnReader,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let kind = ColumnKind::of(col.type_info().name());
            let value = decode_column(row, idx, kind, decode_binary).unwrap_or_else(|e| {
                warn!(column = %col.name(), kind = ?kind, error = %e, "Failed to decode column");
                JsonValue::Null
            });
            (col.name().to_string(), value)
        })
        .collect()
}

/// Conversion of database rows to ordered JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> RowMap {
        self.to_json_map_with_options(false)
    }

    fn to_json_map_with_options(&self, decode_binary: bool) -> RowMap;
}

impl RowToJson for MySqlRow {
    fn to_json_map_with_options(&self, decode_binary: bool) -> RowMap {
        row_to_map(self, decode_binary)
    }
}

impl RowToJson for AnyRow {
    fn to_json_map_with_options(&self, decode_binary: bool) -> RowMap {
        row_to_map(self, decode_binary)
    }
}
