//! Schema introspection output normalization.
//!
//! # Architecture
//!
//! Introspection statements live in the `queries` submodule. Drivers run them
//! through their normal execution path and hand the buffered rows to the pure
//! normalization functions below, which merge the type registry descriptor
//! with the backend's own column metadata.

use crate::db::compiler::parse_type_length;
use crate::db::types::{Dialect, TypeDescriptor, TypeKind, TypeRegistry};
use crate::error::{DbError, DbResult};
use crate::models::query::{ResultSet, Row};
use crate::models::schema::{ColumnInfo, ColumnMap};
use serde_json::Value as JsonValue;

// =============================================================================
// SQL Query Templates
// =============================================================================

pub(crate) mod queries {
    pub mod mysql {
        pub const SHOW_TABLES: &str = "SHOW TABLES";
        pub const SHOW_FULL_COLUMNS: &str = "SHOW FULL COLUMNS FROM";
        pub const SESSION_STATE: &str =
            "SELECT @@SESSION.sql_mode, @@SESSION.character_set_connection";
        pub const CURRENT_DATABASE: &str = "SELECT DATABASE()";
    }

    pub mod sqlite {
        pub const LAST_INSERT_ROWID: &str = "SELECT last_insert_rowid()";
    }
}

/// Normalized descriptor of a MySQL column type, ignoring `zerofill`.
pub fn mysql_datatype(type_name: &str) -> TypeDescriptor {
    TypeRegistry::lookup(Dialect::MySql, &type_name.replace(" zerofill", ""))
}

/// Table names from `SHOW TABLES` rows: the first column of each row.
pub fn table_names(rows: ResultSet) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| {
            row.into_iter().next().and_then(|(_, value)| match value {
                JsonValue::String(name) => Some(name),
                JsonValue::Null => None,
                other => Some(other.to_string()),
            })
        })
        .collect()
}

/// Column descriptions from `SHOW FULL COLUMNS` rows, keyed by column name in
/// ordinal order.
pub fn mysql_columns(rows: ResultSet) -> DbResult<ColumnMap> {
    let mut columns = ColumnMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let column = mysql_column(row, idx as u32 + 1)?;
        columns.insert(column.column_name.clone(), column);
    }
    Ok(columns)
}

/// Normalize one `SHOW FULL COLUMNS` row.
pub fn mysql_column(row: &Row, ordinal_position: u32) -> DbResult<ColumnInfo> {
    let field = required(row, "Field")?;
    let (data_type, length) = parse_type_length(&required(row, "Type")?);

    let datatype = mysql_datatype(&data_type);
    let mut column = ColumnInfo::new(field, data_type.clone(), datatype, ordinal_position)
        .with_default(text(row, "Default"))
        .with_nullable(text(row, "Null").as_deref() == Some("YES"));

    let kind = column.datatype.kind;
    match kind {
        Some(TypeKind::Float) => {
            if let Some(length) = &length {
                let (precision, scale) = match length.split_once(',') {
                    Some((precision, scale)) => (precision, Some(scale)),
                    None => (length.as_str(), None),
                };
                column.numeric_precision = precision.trim().parse().ok();
                column.numeric_scale = scale.and_then(|s| s.trim().parse().ok());
            }
        }
        Some(TypeKind::Int) => {
            column.display = length.as_deref().and_then(|l| l.trim().parse().ok());
        }
        Some(TypeKind::String) => match data_type.as_str() {
            "binary" | "varbinary" => {
                column = column.with_max_length(length.as_deref().and_then(|l| l.parse().ok()));
            }
            "char" | "varchar" => {
                column = column
                    .with_max_length(length.as_deref().and_then(|l| l.parse().ok()))
                    .with_collation(text(row, "Collation"));
            }
            "text" | "tinytext" | "mediumtext" | "longtext" => {
                column = column.with_collation(text(row, "Collation"));
            }
            "enum" | "set" => {
                column = column.with_collation(text(row, "Collation"));
                column.options = length.as_deref().map(enum_options);
            }
            _ => {}
        },
        _ => {}
    }

    column.comment = text(row, "Comment");
    column.extra = text(row, "Extra");
    column.key = text(row, "Key");
    column.privileges = text(row, "Privileges");

    Ok(column)
}

/// Split an ENUM/SET definition body (`'a','b''c'`) into its values.
fn enum_options(definition: &str) -> Vec<String> {
    let inner = definition
        .strip_prefix('\'')
        .and_then(|d| d.strip_suffix('\''))
        .unwrap_or(definition);
    inner
        .split("','")
        .map(|option| option.replace("''", "'"))
        .collect()
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn required(row: &Row, key: &str) -> DbResult<String> {
    text(row, key).ok_or_else(|| DbError::decode(format!("column listing has no {key} value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn show_column(field: &str, ty: &str, collation: JsonValue) -> Row {
        row(json!({
            "Field": field,
            "Type": ty,
            "Collation": collation,
            "Null": "YES",
            "Key": "",
            "Default": null,
            "Extra": "",
            "Privileges": "select,insert",
            "Comment": "",
        }))
    }

    #[test]
    fn test_int_column() {
        let column = mysql_column(&show_column("id", "int(11) unsigned", json!(null)), 1).unwrap();
        assert_eq!(column.data_type, "int unsigned");
        assert_eq!(column.display, Some(11));
        assert_eq!(column.datatype.kind, Some(TypeKind::Int));
        assert_eq!(column.datatype.max, Some(4294967295));
        assert!(column.is_nullable);
        assert_eq!(column.column_default, None);
        assert_eq!(column.privileges.as_deref(), Some("select,insert"));
    }

    #[test]
    fn test_zerofill_is_ignored_for_lookup() {
        let column =
            mysql_column(&show_column("n", "int(5) unsigned zerofill", json!(null)), 1).unwrap();
        assert_eq!(column.data_type, "int unsigned zerofill");
        assert_eq!(column.datatype.min, Some(0));
    }

    #[test]
    fn test_decimal_column() {
        let column = mysql_column(&show_column("price", "decimal(10,2)", json!(null)), 2).unwrap();
        assert_eq!(column.numeric_precision, Some(10));
        assert_eq!(column.numeric_scale, Some(2));
        assert_eq!(column.ordinal_position, 2);
    }

    #[test]
    fn test_varchar_column() {
        let column =
            mysql_column(&show_column("name", "varchar(64)", json!("utf8mb4_general_ci")), 1)
                .unwrap();
        assert_eq!(column.datatype.max_length, Some(64));
        assert_eq!(column.collation_name.as_deref(), Some("utf8mb4_general_ci"));
    }

    #[test]
    fn test_text_column_keeps_registry_length() {
        let column = mysql_column(&show_column("body", "text", json!("utf8mb4_bin")), 1).unwrap();
        assert_eq!(column.datatype.max_length, Some(65535));
        assert_eq!(column.collation_name.as_deref(), Some("utf8mb4_bin"));
    }

    #[test]
    fn test_enum_column_options() {
        let column = mysql_column(
            &show_column("state", "enum('new','it''s','a,b')", json!("utf8mb4_bin")),
            1,
        )
        .unwrap();
        assert_eq!(
            column.options,
            Some(vec!["new".to_string(), "it's".to_string(), "a,b".to_string()])
        );
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let result = mysql_column(&row(json!({"Type": "int"})), 1);
        assert!(matches!(result, Err(DbError::Decode { .. })));
    }

    #[test]
    fn test_columns_keep_order() {
        let rows = ResultSet::new(
            "SHOW FULL COLUMNS FROM `t`",
            vec![
                show_column("z", "int(11)", json!(null)),
                show_column("a", "varchar(3)", json!("utf8mb4_bin")),
            ],
        );
        let columns = mysql_columns(rows).unwrap();
        let names: Vec<&String> = columns.keys().collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(columns["a"].ordinal_position, 2);
    }

    #[test]
    fn test_table_names_take_first_column() {
        let rows = ResultSet::new(
            "SHOW TABLES",
            vec![
                row(json!({"Tables_in_app": "users"})),
                row(json!({"Tables_in_app": "posts"})),
            ],
        );
        assert_eq!(table_names(rows), vec!["users", "posts"]);
    }
}
