//! Database-agnostic type normalization.
//!
//! Maps backend-native column type names to a small portable taxonomy. Lookups
//! are exact-string: callers strip modifiers such as `zerofill` and split
//! `TYPE(length)` with [`parse_type_length`](crate::db::compiler::parse_type_length)
//! before asking.
//!
//! Two tables exist: the SQL standard names (SQL-92 through SQL:2008) and the
//! MySQL extensions. A dialect lookup consults its own table first, then the
//! standard one, and finally yields the empty descriptor.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Portable kind of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    String,
    Int,
    Float,
    Bool,
}

/// Normalized description of a column type.
///
/// The default value is the empty descriptor returned for unknown type names:
/// treat those as opaque strings with no bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeKind>,
    /// Fixed length (strings) or exact precision (numerics)
    #[serde(skip_serializing_if = "is_false")]
    pub exact: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub binary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i128>,
    #[serde(
        rename = "character_maximum_length",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<u64>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl TypeDescriptor {
    pub const EMPTY: Self = Self {
        kind: None,
        exact: false,
        binary: false,
        min: None,
        max: None,
        max_length: None,
    };

    const fn of(kind: TypeKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::EMPTY
        }
    }

    const fn exactly(mut self) -> Self {
        self.exact = true;
        self
    }

    const fn binary_data(mut self) -> Self {
        self.binary = true;
        self
    }

    const fn range(mut self, min: i128, max: i128) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    const fn unsigned(mut self) -> Self {
        self.min = Some(0);
        self
    }

    const fn max_len(mut self, length: u64) -> Self {
        self.max_length = Some(length);
        self
    }

    /// True for the descriptor of an unknown type.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// Which type table to consult before the standard one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Standard,
    MySql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::MySql => write!(f, "mysql"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "sql" => Ok(Self::Standard),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

/// Static lookup over the type tables.
pub struct TypeRegistry;

impl TypeRegistry {
    /// Look up a type name. Unknown names yield [`TypeDescriptor::EMPTY`].
    pub fn lookup(dialect: Dialect, type_name: &str) -> TypeDescriptor {
        let found = match dialect {
            Dialect::Standard => standard_type(type_name),
            Dialect::MySql => mysql_type(type_name).or_else(|| standard_type(type_name)),
        };
        found.unwrap_or_default()
    }
}

const STRING: TypeDescriptor = TypeDescriptor::of(TypeKind::String);
const INT: TypeDescriptor = TypeDescriptor::of(TypeKind::Int);
const FLOAT: TypeDescriptor = TypeDescriptor::of(TypeKind::Float);
const BOOL: TypeDescriptor = TypeDescriptor::of(TypeKind::Bool);

const INT32: TypeDescriptor = INT.range(-2_147_483_648, 2_147_483_647);

fn standard_type(name: &str) -> Option<TypeDescriptor> {
    let descriptor = match name {
        // SQL-92
        "bit" => STRING.exactly(),
        "bit varying" => STRING,
        "char" => STRING.exactly(),
        "char varying" => STRING,
        "character" => STRING.exactly(),
        "character varying" => STRING,
        "date" => STRING,
        "dec" => FLOAT.exactly(),
        "decimal" => FLOAT.exactly(),
        "double precision" => FLOAT,
        "float" => FLOAT,
        "int" | "integer" => INT32,
        "interval" => STRING,
        "national char" => STRING.exactly(),
        "national char varying" => STRING,
        "national character" => STRING.exactly(),
        "national character varying" => STRING,
        "nchar" => STRING.exactly(),
        "nchar varying" => STRING,
        "numeric" => FLOAT.exactly(),
        "real" => FLOAT,
        "smallint" => INT.range(-32_768, 32_767),
        "time" => STRING,
        "time with time zone" => STRING,
        "timestamp" => STRING,
        "timestamp with time zone" => STRING,
        "varchar" => STRING,

        // SQL:1999
        "binary large object" => STRING.binary_data(),
        "blob" => STRING.binary_data(),
        "boolean" => BOOL,
        "char large object" => STRING,
        "character large object" => STRING,
        "clob" => STRING,
        "national character large object" => STRING,
        "nchar large object" => STRING,
        "nclob" => STRING,
        "time without time zone" => STRING,
        "timestamp without time zone" => STRING,

        // SQL:2003
        "bigint" => INT.range(i64::MIN as i128, i64::MAX as i128),

        // SQL:2008
        "binary" => STRING.binary_data().exactly(),
        "binary varying" => STRING.binary_data(),
        "varbinary" => STRING.binary_data(),

        _ => return None,
    };
    Some(descriptor)
}

fn mysql_type(name: &str) -> Option<TypeDescriptor> {
    let descriptor = match name {
        "blob" => STRING.binary_data().max_len(65_535),
        "bool" => BOOL,
        "bigint unsigned" => INT.range(0, u64::MAX as i128),
        "datetime" => STRING,
        "decimal unsigned" => FLOAT.exactly().unsigned(),
        "double" => FLOAT,
        "double precision unsigned" => FLOAT.unsigned(),
        "double unsigned" => FLOAT.unsigned(),
        "enum" => STRING,
        "fixed" => FLOAT.exactly(),
        "fixed unsigned" => FLOAT.exactly().unsigned(),
        "float unsigned" => FLOAT.unsigned(),
        "geometry" => STRING.binary_data(),
        "int unsigned" | "integer unsigned" => INT.range(0, 4_294_967_295),
        "longblob" => STRING.binary_data().max_len(4_294_967_295),
        "longtext" => STRING.max_len(4_294_967_295),
        "mediumblob" => STRING.binary_data().max_len(16_777_215),
        "mediumint" => INT.range(-8_388_608, 8_388_607),
        "mediumint unsigned" => INT.range(0, 16_777_215),
        "mediumtext" => STRING.max_len(16_777_215),
        "national varchar" => STRING,
        "numeric unsigned" => FLOAT.exactly().unsigned(),
        "nvarchar" => STRING,
        "point" => STRING.binary_data(),
        "real unsigned" => FLOAT.unsigned(),
        "set" => STRING,
        "smallint unsigned" => INT.range(0, 65_535),
        "text" => STRING.max_len(65_535),
        "tinyblob" => STRING.binary_data().max_len(255),
        "tinyint" => INT.range(-128, 127),
        "tinyint unsigned" => INT.range(0, 255),
        "tinytext" => STRING.max_len(255),
        "year" => STRING,
        _ => return None,
    };
    Some(descriptor)
}
