//! Core value type exchanged with the engine
//!
//! `SqlValue` is the closed set of scalars that may be bound into a
//! parameterized statement or read back from one. `Data` is what callers
//! hand to write operations before it is narrowed to `SqlValue`s.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DbError, Result};

/// A scalar that can cross the engine boundary
///
/// `Boolean` is bound as the engine's native `0`/`1` integer, so values read
/// back from a table are always `Integer` for what was written as a boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
            SqlValue::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Caller-supplied payload for write operations
///
/// A tree of scalars, lists and keyed entries. It converts from any JSON
/// value, and unlike JSON it can carry byte strings: a `Vec<u8>` becomes a
/// single [`SqlValue::Blob`], never a list of integers.
///
/// # Example
/// ```
/// use dbastable::{Data, SqlValue};
/// use serde_json::json;
///
/// assert_eq!(Data::from(b"ab".to_vec()), Data::Value(SqlValue::Blob(vec![97, 98])));
/// assert_eq!(
///     Data::from(json!([1, "x"])),
///     Data::List(vec![Data::from(1i64), Data::from("x")])
/// );
///
/// let row: Data = [("a", Data::from(1i64)), ("d", Data::from(b"a".to_vec()))]
///     .into_iter()
///     .collect();
/// assert!(matches!(row, Data::Map(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Value(SqlValue),
    List(Vec<Data>),
    /// Ordered `(key, data)` entries
    Map(Vec<(String, Data)>),
}

impl Data {
    /// Build a list from anything convertible
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Data>,
    {
        Data::List(items.into_iter().map(Into::into).collect())
    }

    /// Name of the shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Value(_) => "a value",
            Data::List(_) => "a list",
            Data::Map(_) => "a mapping",
        }
    }

    /// Narrow to a single bindable value
    pub fn into_value(self) -> Result<SqlValue> {
        match self {
            Data::Value(value) => Ok(value),
            Data::List(_) => Err(DbError::unsupported_type("list values are not supported.")),
            Data::Map(_) => Err(DbError::unsupported_type(
                "mapping values are not supported.",
            )),
        }
    }

    /// Narrow a list to its values; anything else is rejected
    pub fn into_values(self) -> Result<Vec<SqlValue>> {
        match self {
            Data::List(items) => items.into_iter().map(Data::into_value).collect(),
            other => Err(DbError::unsupported_type(format!(
                "expected a list of values, got {}",
                other.kind()
            ))),
        }
    }
}

impl From<SqlValue> for Data {
    fn from(value: SqlValue) -> Self {
        Data::Value(value)
    }
}

macro_rules! data_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Data {
                fn from(value: $ty) -> Self {
                    Data::Value(SqlValue::from(value))
                }
            }
        )*
    };
}

data_from_scalar!(i64, i32, f64, bool, &str, String, Vec<u8>);

impl From<&[u8]> for Data {
    fn from(value: &[u8]) -> Self {
        Data::Value(SqlValue::Blob(value.to_vec()))
    }
}

impl From<Vec<SqlValue>> for Data {
    fn from(values: Vec<SqlValue>) -> Self {
        Data::list(values)
    }
}

impl From<Vec<Data>> for Data {
    fn from(items: Vec<Data>) -> Self {
        Data::List(items)
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Data::Value(SqlValue::Null),
            serde_json::Value::Bool(b) => Data::Value(SqlValue::Boolean(b)),
            serde_json::Value::String(s) => Data::Value(SqlValue::Text(s)),
            serde_json::Value::Number(n) => {
                // integral but wider than the engine's integer type falls back to a float
                let value = match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => SqlValue::Integer(i),
                    (None, Some(f)) => SqlValue::Real(f),
                    (None, None) => SqlValue::Null,
                };
                Data::Value(value)
            }
            serde_json::Value::Array(items) => {
                Data::List(items.into_iter().map(Data::from).collect())
            }
            serde_json::Value::Object(map) => {
                Data::Map(map.into_iter().map(|(k, v)| (k, Data::from(v))).collect())
            }
        }
    }
}

impl From<Vec<serde_json::Value>> for Data {
    fn from(items: Vec<serde_json::Value>) -> Self {
        Data::list(items)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Data {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Data::from(serde_json::Value::Object(map))
    }
}

impl<K: Into<String>, V: Into<Data>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Data::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<SqlValue> for serde_json::Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Integer(i) => serde_json::Value::from(i),
            SqlValue::Real(f) => serde_json::Value::from(f),
            SqlValue::Text(s) => serde_json::Value::String(s),
            SqlValue::Blob(b) => serde_json::Value::from(b),
            SqlValue::Boolean(b) => serde_json::Value::Bool(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        assert_eq!(SqlValue::from(3i64), SqlValue::Integer(3));
        assert_eq!(SqlValue::from(3i32), SqlValue::Integer(3));
        assert_eq!(SqlValue::from(2.5), SqlValue::Real(2.5));
        assert_eq!(SqlValue::from(true), SqlValue::Boolean(true));
        assert_eq!(SqlValue::from("a"), SqlValue::Text("a".to_string()));
        assert_eq!(SqlValue::from(vec![1u8, 2]), SqlValue::Blob(vec![1, 2]));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(4i64)), SqlValue::Integer(4));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(SqlValue::Integer(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Boolean(true).as_i64(), Some(1));
        assert_eq!(SqlValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(SqlValue::Text("x".into()).as_str(), Some("x"));
        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Blob(vec![]).type_name(), "blob");
    }

    #[test]
    fn test_serialize_untagged() {
        let values = vec![SqlValue::Integer(1), SqlValue::Text("a".into()), SqlValue::Null];
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json, serde_json::json!([1, "a", null]));
    }

    #[test]
    fn test_data_from_json() {
        let data = Data::from(serde_json::json!({"a": [1, 2.5], "b": null, "c": u64::MAX}));
        assert_eq!(
            data,
            Data::Map(vec![
                (
                    "a".to_string(),
                    Data::List(vec![Data::from(1i64), Data::from(2.5)])
                ),
                ("b".to_string(), Data::Value(SqlValue::Null)),
                ("c".to_string(), Data::Value(SqlValue::Real(u64::MAX as f64))),
            ])
        );
    }

    #[test]
    fn test_data_bytes_are_one_value() {
        assert_eq!(
            Data::from(vec![1u8, 2]).into_value().unwrap(),
            SqlValue::Blob(vec![1, 2])
        );
        assert_eq!(
            Data::from(b"ab".as_slice()).into_value().unwrap(),
            SqlValue::Blob(b"ab".to_vec())
        );
        assert_eq!(
            Data::list([vec![1u8], vec![2u8]]).into_values().unwrap(),
            vec![SqlValue::Blob(vec![1]), SqlValue::Blob(vec![2])]
        );
    }

    #[test]
    fn test_data_narrowing_errors() {
        assert!(matches!(
            Data::list([1i64]).into_value(),
            Err(DbError::UnsupportedType(_))
        ));
        assert!(matches!(
            Data::from(serde_json::json!({"a": 1})).into_value(),
            Err(DbError::UnsupportedType(_))
        ));
        assert!(matches!(
            Data::from(1i64).into_values(),
            Err(DbError::UnsupportedType(_))
        ));
        assert!(matches!(
            Data::from(serde_json::json!([[1]])).into_values(),
            Err(DbError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_into_json() {
        let json: serde_json::Value = SqlValue::Real(1.5).into();
        assert_eq!(json, serde_json::json!(1.5));
        let json: serde_json::Value = SqlValue::Boolean(false).into();
        assert_eq!(json, serde_json::json!(false));
    }
}
