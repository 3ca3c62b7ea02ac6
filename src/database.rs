//! Database - Main entry point for table storage on SQLite
//!
//! This module provides the [`Database`] struct that owns one SQLite
//! connection and exposes table, row, column and cell operations on top of
//! it. Every table created here carries the hidden identity column
//! [`ID_KEY`]; row position `i` is the `i`-th row in identity order.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::column_map::ColumnMap;
use crate::config::{DatabaseConfig, MEMORY_PATH};
use crate::error::{DbError, Result};
use crate::index::fix_index;
use crate::query::Select;
use crate::sql::condition::{Condition, build_order_by_clause, parse_where};
use crate::sql::ddl::DdlGenerator;
use crate::sql::sanitize::{ID_KEY, Sanitizer, quote_identifier};
use crate::types::{Data, SqlValue};
use crate::views::Table;

/// Table storage on an embedded SQLite database
///
/// Owns a single connection; every operation takes `&mut self`, so a
/// handle is used by one task at a time.
pub struct Database {
    /// Database connection
    conn: SqliteConnection,
    /// Database configuration
    config: DatabaseConfig,
    /// Column-name sanitizer built from the configuration
    sanitizer: Sanitizer,
}

impl Database {
    /// Open a database from configuration
    pub async fn open(config: DatabaseConfig) -> Result<Self> {
        let options = if config.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(config.create_if_missing)
        };

        let conn = options.connect().await.map_err(|e| {
            DbError::Connection(format!("Opening '{}' failed: {}", config.path, e))
        })?;

        info!(
            path = %config.path,
            allow_b32_colnames = config.allow_b32_colnames,
            "database opened"
        );

        Ok(Self {
            conn,
            sanitizer: Sanitizer::new(config.allow_b32_colnames),
            config,
        })
    }

    /// Open a private in-memory database with default settings
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(DatabaseConfig::in_memory()).await
    }

    /// Close the underlying connection
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Path of the backing store, or `:memory:`
    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// Get a reference to the column-name sanitizer
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    // =========================================================================
    // Statement plumbing
    // =========================================================================

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        debug!(sql, params = params.len(), "executing statement");
        let result = bind_values(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        debug!(sql, params = params.len(), "fetching rows");
        let rows = bind_values(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_scalar(&mut self, sql: &str, params: &[SqlValue]) -> Result<SqlValue> {
        let rows = self.fetch(sql, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(SqlValue::Null))
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Names of every table, in creation order
    pub async fn table_names(&mut self) -> Result<Vec<String>> {
        let rows = self
            .fetch(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                &[],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|value| match value {
                SqlValue::Text(name) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Number of tables
    pub async fn table_count(&mut self) -> Result<usize> {
        Ok(self.table_names().await?.len())
    }

    /// Whether a table named `name` exists
    ///
    /// Table names compare case-insensitively, as the engine resolves them.
    pub async fn has_table(&mut self, name: &str) -> Result<bool> {
        let count = self
            .fetch_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
                &[SqlValue::from(name)],
            )
            .await?;
        Ok(count.as_i64().unwrap_or(0) > 0)
    }

    async fn ensure_table(&mut self, name: &str) -> Result<()> {
        if self.has_table(name).await? {
            Ok(())
        } else {
            Err(DbError::not_found(format!("Table '{}' does not exist", name)))
        }
    }

    /// Create an empty table
    pub async fn add_table(&mut self, name: &str) -> Result<()> {
        self.add_table_with_columns::<&str>(name, &[]).await
    }

    /// Create a table with the given columns
    ///
    /// Column names go through the sanitizer; the table name is quoted as is.
    pub async fn add_table_with_columns<S: AsRef<str>>(
        &mut self,
        name: &str,
        columns: &[S],
    ) -> Result<()> {
        if self.has_table(name).await? {
            return Err(DbError::conflict(format!("Table '{}' already exists", name)));
        }

        let columns = self.sanitizer.sanitize_keys(columns)?;
        let sql = DdlGenerator::default().generate_create_table(name, &columns);
        self.execute(&sql, &[]).await?;

        info!(table = name, columns = columns.len(), "table created");
        Ok(())
    }

    /// Create a table from column-oriented data
    ///
    /// `data` must be a mapping of column name to a list of values (or a
    /// scalar broadcast to every row). Row-oriented lists carry no column
    /// names and are rejected.
    pub async fn add_table_from_data(&mut self, name: &str, data: impl Into<Data>) -> Result<()> {
        let data = data.into();
        match &data {
            Data::Map(_) => {}
            Data::List(_) => {
                return Err(DbError::shape(
                    "table data must map column names to values, got a list",
                ));
            }
            Data::Value(value) => {
                return Err(DbError::unsupported_type(format!(
                    "table data must be a mapping, got {}",
                    value
                )));
            }
        }

        self.add_table(name).await?;
        self.add_rows(name, data, true).await?;
        Ok(())
    }

    /// Drop a table and all its rows
    pub async fn drop_table(&mut self, name: &str) -> Result<()> {
        self.ensure_table(name).await?;
        let sql = DdlGenerator::default().generate_drop_table(name);
        self.execute(&sql, &[]).await?;
        info!(table = name, "table dropped");
        Ok(())
    }

    /// Row-wise view of the table `name`
    pub async fn table(&mut self, name: &str) -> Result<Table<'_>> {
        self.ensure_table(name).await?;
        Ok(Table::new(self, name.to_string(), None))
    }

    /// Row-wise view of the table `name`, addressed through keyword `map`
    pub async fn table_with_map<'a>(
        &'a mut self,
        name: &str,
        map: &'a mut ColumnMap,
    ) -> Result<Table<'a>> {
        self.ensure_table(name).await?;
        Ok(Table::new(self, name.to_string(), Some(map)))
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Stored names of the user columns of `table`, in declaration order
    ///
    /// The identity column is never listed.
    pub async fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        self.ensure_table(table).await?;
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let rows = self.fetch(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().nth(1))
            .filter_map(|value| match value {
                SqlValue::Text(name) if name != ID_KEY => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Stored name of `column` in `table`
    ///
    /// The name is sanitized first; unknown columns are reported under the
    /// caller's spelling.
    pub async fn get_column_name(&mut self, table: &str, column: &str) -> Result<String> {
        let name = self.sanitizer.sanitize_key(column)?;
        if self.column_names(table).await?.contains(&name) {
            Ok(name)
        } else {
            Err(DbError::not_found(format!(
                "Column '{}' does not exist in table '{}'",
                column, table
            )))
        }
    }

    /// Add a column, optionally filled with `data`
    ///
    /// `data` must be a list. On an empty table it creates one row per
    /// value. Otherwise its length must match the row count. Returns the
    /// stored column name.
    pub async fn add_column(
        &mut self,
        table: &str,
        column: &str,
        data: Option<Data>,
    ) -> Result<String> {
        let values = data.map(Data::into_values).transpose()?;
        self.add_column_values(table, column, values).await
    }

    pub(crate) async fn add_column_values(
        &mut self,
        table: &str,
        column: &str,
        values: Option<Vec<SqlValue>>,
    ) -> Result<String> {
        let name = self.sanitizer.sanitize_key(column)?;
        if self.column_names(table).await?.contains(&name) {
            return Err(DbError::conflict(format!(
                "Column '{}' already exists in table '{}'",
                column, table
            )));
        }

        let length = self.count(table, None).await?;
        if let Some(values) = &values {
            if length > 0 && values.len() != length {
                return Err(DbError::shape(format!(
                    "column data has {} values but table '{}' has {} rows",
                    values.len(),
                    table,
                    length
                )));
            }
        }

        let sql = DdlGenerator::default().generate_add_column(table, &name);
        self.execute(&sql, &[]).await?;
        info!(table, column = %name, "column added");

        if let Some(values) = values {
            if length == 0 {
                let columns = [name.clone()];
                for value in values {
                    self.insert_row(table, &columns, &[value]).await?;
                }
            } else {
                self.write_column(table, &name, values).await?;
            }
        }

        Ok(name)
    }

    /// Drop a column
    pub async fn delete_column(&mut self, table: &str, column: &str) -> Result<()> {
        if column.to_lowercase() == ID_KEY {
            return Err(DbError::protected_name(format!(
                "Column '{}' is protected",
                column
            )));
        }
        let name = self.get_column_name(table, column).await?;
        let sql = DdlGenerator::default().generate_drop_column(table, &name);
        self.execute(&sql, &[]).await?;
        info!(table, column = %name, "column deleted");
        Ok(())
    }

    /// Every value of `column`, in row order
    pub async fn get_column_values(&mut self, table: &str, column: &str) -> Result<Vec<SqlValue>> {
        let name = self.get_column_name(table, column).await?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            quote_identifier(&name),
            quote_identifier(table),
            quote_identifier(ID_KEY)
        );
        let rows = self.fetch(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or(SqlValue::Null))
            .collect())
    }

    /// Replace every value of `column`
    ///
    /// `data` must be a list with one value per row.
    pub async fn set_column(
        &mut self,
        table: &str,
        column: &str,
        data: impl Into<Data>,
    ) -> Result<()> {
        let name = self.get_column_name(table, column).await?;
        let values = data.into().into_values()?;

        let length = self.count(table, None).await?;
        if values.len() != length {
            return Err(DbError::shape(format!(
                "column data has {} values but table '{}' has {} rows",
                values.len(),
                table,
                length
            )));
        }

        self.write_column(table, &name, values).await
    }

    /// Write `values` into `column` of consecutive rows, in row order
    async fn write_column(&mut self, table: &str, column: &str, values: Vec<SqlValue>) -> Result<()> {
        let ids = self.row_ids(table).await?;
        let cells: Vec<(i64, SqlValue)> = ids.into_iter().zip(values).collect();
        self.write_cells(table, column, cells).await
    }

    /// Write `(row position, value)` pairs into a stored column
    pub(crate) async fn set_cells(
        &mut self,
        table: &str,
        column: &str,
        cells: Vec<(usize, SqlValue)>,
    ) -> Result<()> {
        let ids = self.row_ids(table).await?;
        let mut targets = Vec::with_capacity(cells.len());
        for (position, value) in cells {
            let id = ids.get(position).copied().ok_or(DbError::IndexOutOfRange {
                index: position as i64,
                length: ids.len(),
            })?;
            targets.push((id, value));
        }
        self.write_cells(table, column, targets).await
    }

    async fn write_cells(
        &mut self,
        table: &str,
        column: &str,
        cells: Vec<(i64, SqlValue)>,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            quote_identifier(table),
            quote_identifier(column),
            quote_identifier(ID_KEY)
        );
        for (id, value) in cells {
            self.execute(&sql, &[value, SqlValue::Integer(id)]).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Identity values of every row, in row order
    async fn row_ids(&mut self, table: &str) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT {id} FROM {} ORDER BY {id}",
            quote_identifier(table),
            id = quote_identifier(ID_KEY)
        );
        let rows = self.fetch(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(|v| v.as_i64()))
            .collect())
    }

    /// Identity value of the row at position `index` (negative counts from the end)
    async fn row_id(&mut self, table: &str, index: i64) -> Result<i64> {
        let length = self.count(table, None).await?;
        let position = fix_index(index, length)?;
        let sql = format!(
            "SELECT {id} FROM {} ORDER BY {id} LIMIT 1 OFFSET ?",
            quote_identifier(table),
            id = quote_identifier(ID_KEY)
        );
        self.fetch_scalar(&sql, &[SqlValue::Integer(position as i64)])
            .await?
            .as_i64()
            .ok_or(DbError::IndexOutOfRange { index, length })
    }

    async fn insert_row(&mut self, table: &str, columns: &[String], values: &[SqlValue]) -> Result<()> {
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
        } else {
            let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                quoted.join(", "),
                placeholders
            )
        };
        self.execute(&sql, values).await?;
        Ok(())
    }

    /// Append rows to a table
    ///
    /// `data` is either a mapping of column name to values (lists of equal
    /// length, scalars broadcast) or a list of rows, each a list with one
    /// value per existing column. Mapping keys that name no column are
    /// created when `add_columns` is set and dropped otherwise. Returns the
    /// number of rows added.
    pub async fn add_rows(
        &mut self,
        table: &str,
        data: impl Into<Data>,
        add_columns: bool,
    ) -> Result<usize> {
        let existing = self.column_names(table).await?;

        let (columns, rows) = match data.into() {
            Data::Map(entries) => {
                let entries = self.sanitizer.sanitize_map(entries)?;
                let (columns, rows) = columns_to_rows(entries)?;

                let mut kept = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    if existing.contains(column) {
                        kept.push(i);
                    } else if add_columns {
                        let sql = DdlGenerator::default().generate_add_column(table, column);
                        self.execute(&sql, &[]).await?;
                        info!(table, column = %column, "column added");
                        kept.push(i);
                    } else {
                        debug!(table, column = %column, "dropping unknown column");
                    }
                }

                let columns: Vec<String> = kept.iter().map(|&i| columns[i].clone()).collect();
                let rows = rows
                    .into_iter()
                    .map(|row| kept.iter().map(|&i| row[i].clone()).collect())
                    .collect();
                (columns, rows)
            }
            Data::List(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    let values = match item {
                        Data::List(values) => values,
                        other => {
                            return Err(DbError::shape(format!(
                                "each row must be a list of {} values, got {}",
                                existing.len(),
                                other.kind()
                            )));
                        }
                    };
                    if values.len() != existing.len() {
                        return Err(DbError::shape(format!(
                            "row has {} values but table '{}' has {} columns",
                            values.len(),
                            table,
                            existing.len()
                        )));
                    }
                    rows.push(
                        values
                            .into_iter()
                            .map(Data::into_value)
                            .collect::<Result<Vec<_>>>()?,
                    );
                }
                (existing, rows)
            }
            Data::Value(value) => {
                return Err(DbError::unsupported_type(format!(
                    "rows must be a mapping or a list of lists, got {}",
                    value
                )));
            }
        };

        for row in &rows {
            self.insert_row(table, &columns, row).await?;
        }
        debug!(table, rows = rows.len(), "rows added");
        Ok(rows.len())
    }

    /// Values of the row at `index`, in column order
    pub async fn get_row_values(&mut self, table: &str, index: i64) -> Result<Vec<SqlValue>> {
        let columns = self.column_names(table).await?;
        let id = self.row_id(table, index).await?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            quoted.join(", "),
            quote_identifier(table),
            quote_identifier(ID_KEY)
        );
        let rows = self.fetch(&sql, &[SqlValue::Integer(id)]).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Overwrite the row at `index`
    ///
    /// `data` is a mapping of column name to value, touching only those
    /// columns, or a list holding one value per column.
    pub async fn set_row(&mut self, table: &str, index: i64, data: impl Into<Data>) -> Result<()> {
        let existing = self.column_names(table).await?;

        let (columns, values) = match data.into() {
            Data::Map(entries) => {
                let mut columns = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let name = self.sanitizer.sanitize_key(&key)?;
                    if !existing.contains(&name) {
                        return Err(DbError::not_found(format!(
                            "Column '{}' does not exist in table '{}'",
                            key, table
                        )));
                    }
                    columns.push(name);
                    values.push(value.into_value()?);
                }
                (columns, values)
            }
            Data::List(items) => {
                if items.len() != existing.len() {
                    return Err(DbError::shape(format!(
                        "row has {} values but table '{}' has {} columns",
                        items.len(),
                        table,
                        existing.len()
                    )));
                }
                let values = items
                    .into_iter()
                    .map(Data::into_value)
                    .collect::<Result<Vec<_>>>()?;
                (existing, values)
            }
            Data::Value(value) => {
                return Err(DbError::unsupported_type(format!(
                    "row must be a mapping or a list, got {}",
                    value
                )));
            }
        };

        let id = self.row_id(table, index).await?;
        if columns.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(ID_KEY)
        );
        let mut params = values;
        params.push(SqlValue::Integer(id));
        self.execute(&sql, &params).await?;
        Ok(())
    }

    /// Delete the row at `index`; later rows shift up by one
    pub async fn delete_row(&mut self, table: &str, index: i64) -> Result<()> {
        let id = self.row_id(table, index).await?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(table),
            quote_identifier(ID_KEY)
        );
        self.execute(&sql, &[SqlValue::Integer(id)]).await?;
        debug!(table, index, "row deleted");
        Ok(())
    }

    // =========================================================================
    // Cells
    // =========================================================================

    /// Value of `column` in the row at `index`
    pub async fn get_item(&mut self, table: &str, column: &str, index: i64) -> Result<SqlValue> {
        let name = self.get_column_name(table, column).await?;
        let id = self.row_id(table, index).await?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            quote_identifier(&name),
            quote_identifier(table),
            quote_identifier(ID_KEY)
        );
        self.fetch_scalar(&sql, &[SqlValue::Integer(id)]).await
    }

    /// Set `column` in the row at `index`
    pub async fn set_item(
        &mut self,
        table: &str,
        column: &str,
        index: i64,
        value: impl Into<Data>,
    ) -> Result<()> {
        let name = self.get_column_name(table, column).await?;
        let value = value.into().into_value()?;
        let id = self.row_id(table, index).await?;
        self.write_cells(table, &name, vec![(id, value)]).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of rows, optionally restricted by `condition`
    pub async fn count(&mut self, table: &str, condition: Option<&Condition>) -> Result<usize> {
        self.ensure_table(table).await?;
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let mut params = Vec::new();
        if let Some((clause, args)) = parse_where(condition, &self.sanitizer)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params = args;
        }
        let count = self.fetch_scalar(&sql, &params).await?;
        Ok(count.as_i64().unwrap_or(0).max(0) as usize)
    }

    /// Rows of `table` matching `select`
    pub async fn select(&mut self, table: &str, select: &Select) -> Result<Vec<Vec<SqlValue>>> {
        let (pagination, page_args) = select.pagination()?;
        let known = self.column_names(table).await?;

        let columns = match &select.columns {
            Some(requested) => {
                let mut names = Vec::with_capacity(requested.len());
                for column in requested {
                    let name = self.sanitizer.sanitize_key(column)?;
                    if !known.contains(&name) {
                        return Err(DbError::not_found(format!(
                            "Column '{}' does not exist in table '{}'",
                            column, table
                        )));
                    }
                    names.push(name);
                }
                names
            }
            None => known.clone(),
        };

        // a projection of the identity column keeps one output row per match
        let projection = if columns.is_empty() {
            quote_identifier(ID_KEY)
        } else {
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, quote_identifier(table));
        let mut params = Vec::new();
        if let Some((clause, args)) = parse_where(select.condition.as_ref(), &self.sanitizer)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params = args;
        }

        let order = build_order_by_clause(&select.order_by, &known, &self.sanitizer, ID_KEY)?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
        sql.push_str(&pagination);
        params.extend(page_args.into_iter().map(SqlValue::Integer));

        let rows = self.fetch(&sql, &params).await?;
        if columns.is_empty() {
            return Ok(rows.into_iter().map(|_| Vec::new()).collect());
        }
        Ok(rows)
    }

    /// Positions of the rows matching `condition`, ascending
    pub async fn index_of(&mut self, table: &str, condition: &Condition) -> Result<Vec<usize>> {
        self.ensure_table(table).await?;
        // the identity column is protected, so no user column can shadow it
        let mut sql = format!(
            "SELECT {} FROM {}",
            quote_identifier(ID_KEY),
            quote_identifier(table)
        );
        let mut params = Vec::new();
        if let Some((clause, args)) = parse_where(Some(condition), &self.sanitizer)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            params = args;
        }
        sql.push_str(&format!(" ORDER BY {}", quote_identifier(ID_KEY)));

        let matched = self.fetch(&sql, &params).await?;
        let ids = self.row_ids(table).await?;
        Ok(matched
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(|v| v.as_i64()))
            .filter_map(|id| ids.binary_search(&id).ok())
            .collect())
    }

    // =========================================================================
    // Whole database
    // =========================================================================

    /// Copy every table into a fresh in-memory database
    ///
    /// When `indexes` names a table, only the rows at those positions are
    /// copied, still in storage order. The copy shares no state with `self`.
    pub async fn copy(&mut self, indexes: Option<&HashMap<String, Vec<i64>>>) -> Result<Database> {
        let config = DatabaseConfig {
            path: MEMORY_PATH.to_string(),
            ..self.config.clone()
        };
        let mut target = Database::open(config).await?;
        let ddl = DdlGenerator::default();

        for table in self.table_names().await? {
            let columns = self.column_names(&table).await?;
            target
                .execute(&ddl.generate_create_table(&table, &columns), &[])
                .await?;

            let rows = self.select(&table, &Select::new()).await?;
            let keep = indexes
                .and_then(|map| map.get(&table))
                .map(|wanted| {
                    wanted
                        .iter()
                        .map(|&i| fix_index(i, rows.len()))
                        .collect::<Result<HashSet<usize>>>()
                })
                .transpose()?;

            for (position, row) in rows.iter().enumerate() {
                if keep.as_ref().is_none_or(|k| k.contains(&position)) {
                    target.insert_row(&table, &columns, row).await?;
                }
            }
        }

        info!(source = %self.config.path, "database copied");
        Ok(target)
    }

    /// Human-readable listing of tables with their shapes
    pub async fn summary(&mut self) -> Result<String> {
        let mut out = format!("Database '{}':", self.config.path);
        let tables = self.table_names().await?;
        if tables.is_empty() {
            out.push_str("\n\tEmpty database.");
            return Ok(out);
        }
        for table in tables {
            let columns = self.column_names(&table).await?.len();
            let rows = self.count(&table, None).await?;
            out.push_str(&format!("\n\t{}: {} columns {} rows", table, columns, rows));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Bind every value in order
fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Blob(v) => query.bind(v.as_slice()),
            SqlValue::Boolean(v) => query.bind(*v),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

/// Decode one column by its runtime storage class
fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" => SqlValue::Integer(row.try_get::<i64, _>(index)?),
        "REAL" => SqlValue::Real(row.try_get::<f64, _>(index)?),
        "TEXT" => SqlValue::Text(row.try_get::<String, _>(index)?),
        _ => SqlValue::Blob(row.try_get::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

/// Expand column-oriented entries into rows
///
/// List values must share one length; scalars are repeated on every row.
/// With no lists at all the entries form a single row.
fn columns_to_rows(entries: Vec<(String, Data)>) -> Result<(Vec<String>, Vec<Vec<SqlValue>>)> {
    let mut length = None;
    for (key, value) in &entries {
        if let Data::List(items) = value {
            match length {
                None => length = Some(items.len()),
                Some(n) if n != items.len() => {
                    return Err(DbError::shape(format!(
                        "column '{}' has {} values, expected {}",
                        key,
                        items.len(),
                        n
                    )));
                }
                Some(_) => {}
            }
        }
    }
    let length = length.unwrap_or(1);

    let mut columns = Vec::with_capacity(entries.len());
    let mut series = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let values = match value {
            list @ Data::List(_) => list.into_values()?,
            scalar => vec![scalar.into_value()?; length],
        };
        columns.push(key);
        series.push(values);
    }

    let rows = (0..length)
        .map(|i| series.iter().map(|values| values[i].clone()).collect())
        .collect();
    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Payload expansion ====================

    #[test]
    fn test_columns_to_rows_lists() {
        let (columns, rows) = columns_to_rows(vec![
            ("a".to_string(), json!([1, 2]).into()),
            ("b".to_string(), json!(["x", "y"]).into()),
        ])
        .unwrap();
        assert_eq!(columns, vec!["a", "b"]);
        assert_eq!(
            rows,
            vec![
                vec![SqlValue::Integer(1), SqlValue::from("x")],
                vec![SqlValue::Integer(2), SqlValue::from("y")],
            ]
        );
    }

    #[test]
    fn test_columns_to_rows_broadcasts_scalars() {
        let (_, rows) = columns_to_rows(vec![
            ("a".to_string(), json!([1, 2, 3]).into()),
            ("b".to_string(), Data::from(0i64)),
        ])
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r[1] == SqlValue::Integer(0)));
    }

    #[test]
    fn test_columns_to_rows_all_scalars_is_one_row() {
        let (_, rows) = columns_to_rows(vec![
            ("a".to_string(), Data::from(3i64)),
            ("c".to_string(), Data::from(4i64)),
        ])
        .unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(3), SqlValue::Integer(4)]]);
    }

    #[test]
    fn test_columns_to_rows_length_mismatch() {
        let result = columns_to_rows(vec![
            ("a".to_string(), json!([1, 2]).into()),
            ("b".to_string(), json!([1, 2, 3]).into()),
        ]);
        assert!(matches!(result, Err(DbError::Shape(_))));
    }

    #[test]
    fn test_columns_to_rows_nested_value() {
        let result = columns_to_rows(vec![("a".to_string(), json!([[1], [2]]).into())]);
        assert!(matches!(result, Err(DbError::UnsupportedType(_))));
    }

    // ==================== Engine round trips ====================

    #[tokio::test]
    async fn test_open_in_memory_is_empty() {
        let mut db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.path(), ":memory:");
        assert_eq!(db.table_count().await.unwrap(), 0);
        assert_eq!(
            db.summary().await.unwrap(),
            "Database ':memory:':\n\tEmpty database."
        );
    }

    #[tokio::test]
    async fn test_decode_storage_classes() {
        let mut db = Database::open_in_memory().await.unwrap();
        db.add_table_with_columns("t", &["i", "r", "s", "b", "n", "f"])
            .await
            .unwrap();
        db.add_rows(
            "t",
            json!([[1, 2.5, "x", null, null, true]]),
            false,
        )
        .await
        .unwrap();

        let values = db.get_row_values("t", 0).await.unwrap();
        assert_eq!(values[0], SqlValue::Integer(1));
        assert_eq!(values[1], SqlValue::Real(2.5));
        assert_eq!(values[2], SqlValue::from("x"));
        assert_eq!(values[3], SqlValue::Null);
        assert_eq!(values[4], SqlValue::Null);
        // booleans read back as integers
        assert_eq!(values[5], SqlValue::Integer(1));
    }

    #[test]
    fn test_columns_to_rows_bytes_are_one_value() {
        let (_, rows) = columns_to_rows(vec![
            ("a".to_string(), json!([1, 2]).into()),
            ("d".to_string(), Data::from(b"a".to_vec())),
        ])
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r[1] == SqlValue::Blob(vec![97])));
    }

    #[tokio::test]
    async fn test_blob_round_trip() {
        let mut db = Database::open_in_memory().await.unwrap();
        db.add_table_with_columns("t", &["b"]).await.unwrap();
        db.add_rows("t", json!([[null]]), false).await.unwrap();
        db.set_cells("t", "b", vec![(0, SqlValue::Blob(vec![0, 1, 255]))])
            .await
            .unwrap();
        assert_eq!(
            db.get_item("t", "b", 0).await.unwrap(),
            SqlValue::Blob(vec![0, 1, 255])
        );

        db.set_item("t", "b", 0, vec![7u8, 8]).await.unwrap();
        assert_eq!(
            db.get_item("t", "b", 0).await.unwrap(),
            SqlValue::Blob(vec![7, 8])
        );
    }

    #[tokio::test]
    async fn test_row_ids_follow_deletions() {
        let mut db = Database::open_in_memory().await.unwrap();
        db.add_table("t").await.unwrap();
        db.add_column("t", "a", Some(json!([1, 2, 3]).into()))
            .await
            .unwrap();
        db.delete_row("t", 0).await.unwrap();
        assert_eq!(db.row_ids("t").await.unwrap(), vec![2, 3]);
        assert_eq!(db.row_id("t", -1).await.unwrap(), 3);
        assert!(matches!(
            db.row_id("t", 2).await,
            Err(DbError::IndexOutOfRange { index: 2, length: 2 })
        ));
    }
}
