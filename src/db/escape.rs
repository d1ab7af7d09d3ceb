//! String-literal escaping for the supported backends.
//!
//! The MySQL session state that affects escaping (the `NO_BACKSLASH_ESCAPES`
//! SQL mode and the connection charset) is read from the server when the
//! driver connects. Until then a [`MySqlEscaper`] refuses to escape text.

use crate::db::compiler::Escape;
use crate::error::{DbError, DbResult};

/// Multi-byte charsets in which a trail byte may equal `\`, so backslash
/// escaping of UTF-8 input cannot be trusted.
const UNSAFE_MYSQL_CHARSETS: &[&str] = &["big5", "cp932", "gb2312", "gbk", "gb18030", "sjis"];

/// MySQL escaping state of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlEscaper {
    charset: Option<String>,
    /// `None` until the SQL mode of the session has been read
    no_backslash_escapes: Option<bool>,
}

impl MySqlEscaper {
    /// Escaper for a session whose SQL mode is not known yet.
    pub fn new(charset: Option<String>) -> Self {
        Self {
            charset,
            no_backslash_escapes: None,
        }
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Record the SQL mode the session runs with.
    pub fn set_sql_mode(&mut self, sql_mode: &str) {
        self.no_backslash_escapes = Some(
            sql_mode
                .split(',')
                .any(|mode| mode.trim().eq_ignore_ascii_case("NO_BACKSLASH_ESCAPES")),
        );
    }

    /// Forget the session SQL mode.
    pub fn reset(&mut self) {
        self.no_backslash_escapes = None;
    }

    /// Whether the session runs with `NO_BACKSLASH_ESCAPES`, once known.
    pub fn no_backslash_escapes(&self) -> Option<bool> {
        self.no_backslash_escapes
    }
}

impl Escape for MySqlEscaper {
    fn escape(&self, value: &str) -> DbResult<String> {
        if let Some(charset) = self.charset.as_deref() {
            if UNSAFE_MYSQL_CHARSETS
                .iter()
                .any(|unsafe_charset| charset.eq_ignore_ascii_case(unsafe_charset))
            {
                return Err(DbError::escape(format!(
                    "refusing to escape for connection charset {charset}"
                )));
            }
        }
        let Some(no_backslash_escapes) = self.no_backslash_escapes else {
            return Err(DbError::escape(
                "session SQL mode is unknown until the driver has connected",
            ));
        };
        Ok(mysql_escape(value, no_backslash_escapes))
    }
}

/// Escape for MySQL, the way `mysql_real_escape_string` does, and wrap in
/// single quotes.
pub fn mysql_escape(value: &str, no_backslash_escapes: bool) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    if no_backslash_escapes {
        for c in value.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
    } else {
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
    }
    out.push('\'');
    out
}

/// Quote a charset name for `SET NAMES`.
///
/// Only plain words are accepted, so the literal reads the same under every
/// SQL mode and session charset.
pub fn charset_literal(charset: &str) -> DbResult<String> {
    if charset.is_empty()
        || !charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DbError::connection(
            None,
            format!("invalid charset name: {charset:?}"),
        ));
    }
    Ok(format!("'{charset}'"))
}

/// SQL-standard escaping: single quotes doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEscaper;

impl Escape for StandardEscaper {
    fn escape(&self, value: &str) -> DbResult<String> {
        if value.contains('\0') {
            return Err(DbError::escape("string literal contains a NUL byte"));
        }
        Ok(format!("'{}'", value.replace('\'', "''")))
    }
}

/// PostgreSQL escaping that holds whatever `standard_conforming_strings` is
/// set to.
///
/// Text without a backslash becomes a plain literal with quotes doubled. Text
/// with one becomes an `E'...'` literal, in which backslashes always escape.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresEscaper;

impl Escape for PostgresEscaper {
    fn escape(&self, value: &str) -> DbResult<String> {
        if !value.contains('\\') {
            return StandardEscaper.escape(value);
        }
        if value.contains('\0') {
            return Err(DbError::escape("string literal contains a NUL byte"));
        }
        Ok(format!(
            "E'{}'",
            value.replace('\\', "\\\\").replace('\'', "''")
        ))
    }
}
