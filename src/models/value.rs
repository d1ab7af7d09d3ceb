//! Values accepted by the quoting engine.

use crate::models::expression::{Expression, SubQuery};
use serde_json::Value as JsonValue;

/// A value to be rendered as a SQL literal.
///
/// Conversion into `Value` happens once at the call boundary; the compiler then
/// dispatches on the variant.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Rendered as a parenthesized list, e.g. for `IN (...)`
    Sequence(Vec<Value>),
    Expression(Expression),
    SubQuery(SubQuery),
}

impl Value {
    /// Build a sequence value.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Expression(a), Self::Expression(b)) => a == b,
            (Self::SubQuery(a), Self::SubQuery(b)) => a.same_statement(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Expression> for Value {
    fn from(v: Expression) -> Self {
        Self::Expression(v)
    }
}

impl From<SubQuery> for Value {
    fn from(v: SubQuery) -> Self {
        Self::SubQuery(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::list(v)
    }
}

/// Configuration files carry session variables as JSON-like values.
impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                // u64 beyond i64 and floats
                None => match n.as_u64() {
                    Some(u) => Self::Text(u.to_string()),
                    None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            JsonValue::String(s) => Self::Text(s),
            JsonValue::Array(items) => Self::list(items),
            JsonValue::Object(_) => Self::Text(v.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn test_vec_maps_to_sequence() {
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::Sequence(vec![Value::Text("a".into()), Value::Text("b".into())])
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(true)), Value::Bool(true));
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!("utf8")), Value::Text("utf8".into()));
        assert_eq!(
            Value::from(json!([1, "x"])),
            Value::Sequence(vec![Value::Int(1), Value::Text("x".into())])
        );
        assert_eq!(
            Value::from(json!(18446744073709551615u64)),
            Value::Text("18446744073709551615".into())
        );
    }
}
