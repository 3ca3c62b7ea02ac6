//! Error types for table operations

use thiserror::Error;

/// Errors raised by the sanitizer, the condition builder and the table views
#[derive(Debug, Error)]
pub enum DbError {
    /// Identifier fails the simple-identifier grammar and cannot be encoded
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Identifier collides with the identity column or the encoded-name prefix
    #[error("Protected name: {0}")]
    ProtectedName(String),

    /// Value or payload of a kind this layer does not accept
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Unknown table, column or keyword
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row index outside `[0, length)` after wraparound
    #[error("Index {index} out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },

    /// Wrong arity or malformed payload
    #[error("Invalid shape: {0}")]
    Shape(String),

    /// Multi-axis key that cannot address a table
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Name that is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// Encoded column name that does not decode back to UTF-8 text
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl DbError {
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    pub fn protected_name(msg: impl Into<String>) -> Self {
        Self::ProtectedName(msg.into())
    }

    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
