//! DDL Generation for managed tables
//!
//! Generates SQLite DDL statements for tables created through this crate.
//! Every table carries the hidden identity column; user columns are declared
//! without a type so the engine keeps whatever storage class was bound.

use crate::sql::sanitize::{ID_KEY, quote_identifier};

/// DDL Generator for managed tables
#[derive(Debug, Clone, Copy)]
pub struct DdlGenerator<'a> {
    id_column: &'a str,
}

impl Default for DdlGenerator<'static> {
    fn default() -> Self {
        Self { id_column: ID_KEY }
    }
}

impl<'a> DdlGenerator<'a> {
    /// Create a generator using `id_column` as the identity column
    pub fn new(id_column: &'a str) -> Self {
        Self { id_column }
    }

    /// Generate CREATE TABLE statement with the identity column
    ///
    /// `columns` must already be sanitized.
    pub fn generate_create_table(&self, table_name: &str, columns: &[String]) -> String {
        let quoted_table = quote_identifier(table_name);

        let mut column_defs = vec![format!(
            "{} INTEGER PRIMARY KEY",
            quote_identifier(self.id_column)
        )];
        column_defs.extend(columns.iter().map(|c| quote_identifier(c)));

        format!("CREATE TABLE {} ({})", quoted_table, column_defs.join(", "))
    }

    /// Generate ALTER TABLE ... ADD COLUMN statement
    pub fn generate_add_column(&self, table_name: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table_name),
            quote_identifier(column)
        )
    }

    /// Generate ALTER TABLE ... DROP COLUMN statement
    pub fn generate_drop_column(&self, table_name: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table_name),
            quote_identifier(column)
        )
    }

    /// Generate DROP TABLE statement
    pub fn generate_drop_table(&self, table_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name))
    }
}
