//! Raw SQL fragments, nested statements and qualified names.
//!
//! These are the values the compiler treats specially: an [`Expression`] is
//! trusted SQL that is emitted verbatim, a [`SubQuery`] is a statement that is
//! compiled and wrapped in parentheses. Both rules apply in value, identifier
//! and table positions alike.

use crate::db::compiler::Compiler;
use crate::error::DbResult;
use crate::models::value::Value;
use std::fmt;
use std::sync::Arc;

/// Trusted, already-valid SQL that bypasses quoting and escaping.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    sql: String,
    /// Bound by the statement builder that owns the expression
    parameters: Vec<(String, Value)>,
}

impl Expression {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a named parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// Compile the expression: its raw text, untouched.
    pub fn compile(&self) -> String {
        self.sql.clone()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A statement that can be compiled against a driver's quoting rules.
///
/// Statement builders implement this to be usable as sub-queries.
pub trait Compile: fmt::Debug + Send + Sync {
    fn compile(&self, compiler: &Compiler<'_>) -> DbResult<String>;
}

/// A nested statement, compiled to `(<statement>)`.
#[derive(Debug, Clone)]
pub struct SubQuery(Arc<dyn Compile>);

impl SubQuery {
    pub fn new<C: Compile + 'static>(statement: C) -> Self {
        Self(Arc::new(statement))
    }

    /// Compile the inner statement and parenthesize it. No whitespace is added
    /// or normalized.
    pub fn compile(&self, compiler: &Compiler<'_>) -> DbResult<String> {
        Ok(format!("({})", self.0.compile(compiler)?))
    }

    pub(crate) fn same_statement(&self, other: &SubQuery) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The thing being named: a plain (possibly dotted) name, or a compiled fragment.
#[derive(Debug, Clone)]
pub enum Identifier {
    Name(String),
    Expression(Expression),
    SubQuery(SubQuery),
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Self::Name(v.to_string())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Self::Name(v)
    }
}

impl From<&String> for Identifier {
    fn from(v: &String) -> Self {
        Self::Name(v.clone())
    }
}

impl From<Expression> for Identifier {
    fn from(v: Expression) -> Self {
        Self::Expression(v)
    }
}

impl From<SubQuery> for Identifier {
    fn from(v: SubQuery) -> Self {
        Self::SubQuery(v)
    }
}

/// A name as written in a statement: `name`, `schema.table.column`, or either
/// of those with an alias.
#[derive(Debug, Clone)]
pub struct QualifiedName {
    pub target: Identifier,
    pub alias: Option<String>,
}

impl QualifiedName {
    pub fn new(target: impl Into<Identifier>) -> Self {
        Self {
            target: target.into(),
            alias: None,
        }
    }

    pub fn aliased(target: impl Into<Identifier>, alias: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            alias: Some(alias.into()),
        }
    }
}

impl From<&str> for QualifiedName {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for QualifiedName {
    fn from(v: String) -> Self {
        Self::new(v)
    }
}

impl From<&String> for QualifiedName {
    fn from(v: &String) -> Self {
        Self::new(v)
    }
}

impl From<Expression> for QualifiedName {
    fn from(v: Expression) -> Self {
        Self::new(v)
    }
}

impl From<SubQuery> for QualifiedName {
    fn from(v: SubQuery) -> Self {
        Self::new(v)
    }
}

impl<T, A> From<(T, A)> for QualifiedName
where
    T: Into<Identifier>,
    A: Into<String>,
{
    fn from((target, alias): (T, A)) -> Self {
        Self::aliased(target, alias)
    }
}
