//! SQL Identifier and Value Sanitization
//!
//! Column names are syntax and cannot be bound as parameters, so they go
//! through an allow-list: names made of ASCII letters, digits and underscores
//! are case-folded and used as-is; anything else is either rejected or, when
//! enabled, base32-encoded behind a reserved prefix. Values are data and are
//! narrowed to the closed set of [`SqlValue`] variants before being bound.

use std::sync::LazyLock;

use data_encoding::{BASE32, BASE32_NOPAD};
use regex::Regex;

use crate::error::{DbError, Result};
use crate::types::{Data, SqlValue};

/// Name of the hidden column holding each row's identity
pub const ID_KEY: &str = "__id__";

/// Prefix marking a base32-encoded column name
pub const B32_COL_PREFIX: &str = "__b32__";

static SIMPLE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Example
/// ```
/// use dbastable::sql::quote_identifier;
///
/// let quoted = quote_identifier("my_table");
/// assert_eq!(quoted, "\"my_table\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    // Escape any double quotes in the identifier by doubling them
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Whether `name` only contains ASCII letters, digits and underscores
pub fn is_simple_identifier(name: &str) -> bool {
    SIMPLE_IDENTIFIER.is_match(name)
}

/// Encode a key as a prefixed, unpadded base32 column name
///
/// # Example
/// ```
/// use dbastable::sql::encode_b32;
///
/// assert_eq!(encode_b32("test-2"), "__b32__ORSXG5BNGI");
/// ```
pub fn encode_b32(key: &str) -> String {
    let folded = key.to_lowercase();
    format!("{}{}", B32_COL_PREFIX, BASE32_NOPAD.encode(folded.as_bytes()))
}

/// Decode a column name produced by [`encode_b32`]
pub fn decode_b32(name: &str) -> Result<String> {
    let body = name.strip_prefix(B32_COL_PREFIX).unwrap_or(name);

    let mut padded = body.to_string();
    let remainder = padded.len() % 8;
    if remainder != 0 {
        padded.push_str(&"=".repeat(8 - remainder));
    }

    let bytes = BASE32
        .decode(padded.as_bytes())
        .map_err(|e| DbError::Encoding(format!("'{}' is not valid base32: {}", name, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| DbError::Encoding(format!("'{}' does not decode to UTF-8: {}", name, e)))
}

/// Turns caller-supplied column names into identifiers safe to splice into SQL
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    allow_b32: bool,
}

impl Sanitizer {
    pub fn new(allow_b32: bool) -> Self {
        Self { allow_b32 }
    }

    pub fn allows_b32(&self) -> bool {
        self.allow_b32
    }

    /// Sanitize a single column name
    ///
    /// Rules:
    /// - The identity column and names carrying the encoded prefix are protected
    /// - Simple identifiers are returned lowercased
    /// - Anything else is base32-encoded when allowed, rejected otherwise
    pub fn sanitize_key(&self, key: &str) -> Result<String> {
        let folded = key.to_lowercase();
        if folded == ID_KEY || folded.starts_with(B32_COL_PREFIX) {
            return Err(DbError::protected_name(format!(
                "'{}' uses a protected name.",
                key
            )));
        }

        if key.is_empty() {
            return Err(DbError::invalid_name("Column name cannot be empty"));
        }

        if is_simple_identifier(key) {
            return Ok(folded);
        }

        if self.allow_b32 {
            Ok(encode_b32(key))
        } else {
            Err(DbError::invalid_name(format!(
                "Invalid column name: '{}'.",
                key
            )))
        }
    }

    /// Sanitize every name of a sequence, preserving order
    pub fn sanitize_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<String>> {
        keys.iter().map(|k| self.sanitize_key(k.as_ref())).collect()
    }

    /// Sanitize the keys of an ordered mapping, passing values through
    ///
    /// Uniqueness of the resulting names is not re-checked here.
    pub fn sanitize_map<V>(&self, entries: Vec<(String, V)>) -> Result<Vec<(String, V)>> {
        entries
            .into_iter()
            .map(|(k, v)| Ok((self.sanitize_key(&k)?, v)))
            .collect()
    }

    /// Recover the caller-facing name of a stored column
    pub fn display_name(&self, column: &str) -> Result<String> {
        if column.starts_with(B32_COL_PREFIX) {
            decode_b32(column)
        } else {
            Ok(column.to_string())
        }
    }
}

/// Narrow a dynamic value to a bindable [`SqlValue`]
///
/// Null, strings, numbers and booleans are accepted. Arrays and objects are
/// rejected: nothing outside this switch reaches a statement. Byte strings
/// have no JSON form and are written through [`Data`] instead.
pub fn sanitize_value(value: &serde_json::Value) -> Result<SqlValue> {
    Data::from(value.clone()).into_value()
}
