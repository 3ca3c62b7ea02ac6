//! # dbastable
//!
//! Row, column and table views over an embedded SQLite database.
//!
//! This crate lets callers treat SQLite tables like in-memory tables: rows
//! are addressed by position (negative positions count from the end),
//! columns by name, and cells by a `(row, column)` pair. Every identifier
//! and value passes through a sanitizer before it reaches the engine.
//!
//! ## Features
//!
//! - **Sanitized Identifiers**: Column names are case-folded and validated; names outside `[A-Za-z0-9_]+` can be base32-encoded instead of rejected
//! - **Parameterized Filters**: `Where` fragments and keyed conditions always bind their values
//! - **Multi-Axis Indexing**: `get`/`set` on tables, rows and columns accept integers, names, slices, position lists and `(row, column)` tuples
//! - **Keyword Columns**: A `ColumnMap` maps free-form keywords to generated `col_<n>` columns
//! - **Storage Order**: Row position follows a hidden identity column, so deletions shift later rows up
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbastable::{Condition, Database, Select};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut db = Database::open_in_memory().await?;
//!
//!     db.add_table_from_data("points", json!({"a": [1, 3, 5], "b": [2, 4, 6]}))
//!         .await?;
//!
//!     let rows = db
//!         .select("points", &Select::new().filter(Condition::new().filter("a", 3)))
//!         .await?;
//!     assert_eq!(rows.len(), 1);
//!
//!     let mut table = db.table("points").await?;
//!     table.set((1, "b"), json!(-1)).await?;
//!     assert_eq!(table.index_of(&"b < 0".into()).await?, vec![1]);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! A database is opened from a `DatabaseConfig`:
//!
//! ```rust
//! use dbastable::DatabaseConfig;
//!
//! let config = DatabaseConfig::builder("/tmp/tables.db")
//!     .allow_b32_colnames(true)   // Encode names like "key-b" instead of rejecting them
//!     .create_if_missing(true)    // Create the file on open (default)
//!     .build();
//! assert!(!config.is_memory());
//! ```

pub mod column_map;
pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod query;
pub mod sql;
pub mod types;
pub mod views;

// Re-export main types for convenience
pub use column_map::ColumnMap;
pub use config::{DatabaseConfig, DatabaseConfigBuilder, MEMORY_PATH};
pub use database::Database;
pub use error::{DbError, Result};
pub use index::{Key, Slice};
pub use query::Select;
pub use types::{Data, SqlValue};
pub use views::{Column, Row, Selection, Table};

// Re-export SQL utilities for advanced users
pub use sql::condition::{
    Condition, Criterion, Operator, Predicate, SortOrder, Where, build_order_by_clause,
    parse_where,
};
pub use sql::ddl::DdlGenerator;
pub use sql::sanitize::{
    B32_COL_PREFIX, ID_KEY, Sanitizer, decode_b32, encode_b32, quote_identifier, sanitize_value,
};
