//! SQL quoting and composition.
//!
//! A [`Compiler`] turns values and names into backend-correct SQL text. It is
//! parameterized only by the driver's [`Quoting`] rules and its [`Escape`]
//! primitive, so compilation never touches the connection and can run from
//! shared references.
//!
//! Rules that hold in every position:
//! - an [`Expression`](crate::models::Expression) compiles to its raw text,
//! - a [`SubQuery`](crate::models::SubQuery) compiles to `(inner)`,
//! - a whole name of `*` is returned untouched.

use crate::error::{DbError, DbResult};
use crate::models::expression::{Identifier, QualifiedName};
use crate::models::value::Value;

/// The string-literal escaping primitive of a backend.
///
/// Implementations return a complete literal, enclosing quotes included.
pub trait Escape: Send + Sync {
    fn escape(&self, value: &str) -> DbResult<String>;
}

/// Identifier quoting rules of a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quoting {
    /// Identifier quote character; `None` emits names unwrapped
    pub identifier: Option<char>,
    /// Prepended to real table names
    pub table_prefix: String,
}

impl Quoting {
    pub fn new(identifier: Option<char>, table_prefix: impl Into<String>) -> Self {
        Self {
            identifier,
            table_prefix: table_prefix.into(),
        }
    }

    /// Wrap one name segment, doubling any quote character inside it.
    pub fn wrap(&self, segment: &str) -> String {
        let Some(quote) = self.identifier else {
            return segment.to_string();
        };

        let mut out = String::with_capacity(segment.len() + 2);
        out.push(quote);
        for c in segment.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamePosition {
    Identifier,
    Column,
    Table,
}

/// Quoting engine bound to one driver's rules.
#[derive(Clone, Copy)]
pub struct Compiler<'a> {
    quoting: &'a Quoting,
    escaper: &'a dyn Escape,
}

impl std::fmt::Debug for Compiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("quoting", self.quoting)
            .finish_non_exhaustive()
    }
}

impl<'a> Compiler<'a> {
    pub fn new(quoting: &'a Quoting, escaper: &'a dyn Escape) -> Self {
        Self { quoting, escaper }
    }

    pub fn quoting(&self) -> &Quoting {
        self.quoting
    }

    pub fn table_prefix(&self) -> &str {
        &self.quoting.table_prefix
    }

    /// Escape a string into a complete literal.
    pub fn escape(&self, value: &str) -> DbResult<String> {
        self.escaper.escape(value)
    }

    /// Quote a value for use as a SQL literal.
    ///
    /// ```ignore
    /// compiler.quote(Value::Null)?;   // NULL
    /// compiler.quote(10)?;            // 10
    /// compiler.quote("fred")?;        // 'fred'
    /// compiler.quote(vec![1, 2])?;    // (1, 2)
    /// ```
    pub fn quote(&self, value: impl Into<Value>) -> DbResult<String> {
        self.quote_value(&value.into())
    }

    pub fn quote_value(&self, value: &Value) -> DbResult<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(true) => Ok("'1'".to_string()),
            Value::Bool(false) => Ok("'0'".to_string()),
            Value::SubQuery(query) => query.compile(self),
            Value::Expression(expr) => Ok(expr.compile()),
            Value::Sequence(values) => {
                let quoted = values
                    .iter()
                    .map(|v| self.quote_value(v))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!("({})", quoted.join(", ")))
            }
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => self.escaper.escape(s),
        }
    }

    /// Quote an identifier. Dotted paths are quoted per segment.
    pub fn quote_identifier(&self, name: impl Into<QualifiedName>) -> DbResult<String> {
        self.quote_name(name.into(), NamePosition::Identifier)
    }

    /// Quote a column reference, prefixing the table segment of a dotted path.
    ///
    /// ```ignore
    /// // with prefix "pfx_": `a`.`pfx_b`.`c` AS `alias`
    /// compiler.quote_column(("a.b.c", "alias"))?;
    /// ```
    pub fn quote_column(&self, name: impl Into<QualifiedName>) -> DbResult<String> {
        self.quote_name(name.into(), NamePosition::Column)
    }

    /// Quote a table reference, prefixing the table name and its alias.
    ///
    /// ```ignore
    /// // with prefix "pfx_": `a`.`pfx_b` AS `pfx_alias`
    /// compiler.quote_table(("a.b", "alias"))?;
    /// ```
    pub fn quote_table(&self, name: impl Into<QualifiedName>) -> DbResult<String> {
        self.quote_name(name.into(), NamePosition::Table)
    }

    fn quote_name(&self, name: QualifiedName, position: NamePosition) -> DbResult<String> {
        let QualifiedName { target, alias } = name;

        let mut sql = match target {
            Identifier::SubQuery(query) => query.compile(self)?,
            Identifier::Expression(expr) => expr.compile(),
            Identifier::Name(name) if name == "*" => return Ok(name),
            Identifier::Name(name) => self.quote_path(&name, position),
        };

        if let Some(alias) = alias {
            sql.push_str(" AS ");
            if position == NamePosition::Table {
                sql.push_str(&self.quoting.wrap(&format!("{}{}", self.table_prefix(), alias)));
            } else {
                sql.push_str(&self.quoting.wrap(&alias));
            }
        }

        Ok(sql)
    }

    fn quote_path(&self, name: &str, position: NamePosition) -> String {
        let segments: Vec<&str> = name.split('.').collect();
        let prefix = self.table_prefix();

        let prefixed = match position {
            NamePosition::Identifier => None,
            NamePosition::Column => segments.len().checked_sub(2),
            NamePosition::Table => segments.len().checked_sub(1),
        }
        .filter(|_| !prefix.is_empty());

        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                // `t.*` selects every column of `t`; a quoted `*` would name a column
                if *segment == "*" && position != NamePosition::Table {
                    (*segment).to_string()
                } else if prefixed == Some(i) {
                    self.quoting.wrap(&format!("{prefix}{segment}"))
                } else {
                    self.quoting.wrap(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Format a float as a locale-independent decimal literal.
///
/// The shortest representation that round-trips, never in scientific notation
/// and always with a fractional part.
pub fn format_float(value: f64) -> DbResult<String> {
    if !value.is_finite() {
        return Err(DbError::escape(format!(
            "cannot represent {value} as a SQL literal"
        )));
    }
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    Ok(text)
}

/// Split `NAME(LENGTH)suffix` into `("NAMEsuffix", Some("LENGTH"))`.
///
/// The length is returned as one string; `DECIMAL(10,2)` yields `"10,2"`.
pub fn parse_type_length(type_spec: &str) -> (String, Option<String>) {
    let Some(open) = type_spec.find('(') else {
        return (type_spec.to_string(), None);
    };
    let Some(close) = type_spec.rfind(')').filter(|close| *close > open) else {
        return (type_spec.to_string(), None);
    };

    let name = format!("{}{}", &type_spec[..open], &type_spec[close + 1..]);
    let length = type_spec[open + 1..close].to_string();
    (name, Some(length))
}
