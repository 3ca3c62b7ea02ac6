use tracing::debug;

use crate::column_map::ColumnMap;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::index::{Address, Key, fix_index, resolve};
use crate::query::Select;
use crate::sql::condition::Condition;
use crate::types::{Data, SqlValue};
use crate::views::{Column, Row, Selection, spread};

/// View of one table
///
/// Obtained from [`Database::table`] or [`Database::table_with_map`]. With a
/// column map every column name given to or returned by the view is a
/// keyword.
#[derive(Debug)]
pub struct Table<'a> {
    db: &'a mut Database,
    name: String,
    colmap: Option<&'a mut ColumnMap>,
}

impl<'a> Table<'a> {
    pub(crate) fn new(db: &'a mut Database, name: String, colmap: Option<&'a mut ColumnMap>) -> Self {
        Self { db, name, colmap }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether column names go through a keyword map
    pub fn is_mapped(&self) -> bool {
        self.colmap.is_some()
    }

    /// Column name as the engine knows it
    async fn storage_name(&mut self, column: &str) -> Result<String> {
        match self.colmap.as_deref_mut() {
            Some(map) => map.get_column_name(self.db, column, false).await,
            None => Ok(column.to_string()),
        }
    }

    async fn storage_names(&mut self, columns: &[String]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(columns.len());
        for column in columns {
            names.push(self.storage_name(column).await?);
        }
        Ok(names)
    }

    async fn storage_condition(&mut self, condition: &Condition) -> Result<Condition> {
        match self.colmap.as_deref_mut() {
            Some(map) => map.parse_where(self.db, condition).await,
            None => Ok(condition.clone()),
        }
    }

    /// User-facing column names, in declaration order
    ///
    /// Keywords for a mapped table, decoded names otherwise.
    pub async fn column_names(&mut self) -> Result<Vec<String>> {
        let stored = self.db.column_names(&self.name).await?;
        match self.colmap.as_deref_mut() {
            Some(map) => map.get_keywords(self.db, &stored).await,
            None => stored
                .iter()
                .map(|c| self.db.sanitizer().display_name(c))
                .collect(),
        }
    }

    /// Whether `column` names a column of this table
    pub async fn contains_column(&mut self, column: &str) -> Result<bool> {
        let wanted = column.to_lowercase();
        Ok(self.column_names().await?.contains(&wanted))
    }

    /// Number of rows
    pub async fn len(&mut self) -> Result<usize> {
        self.db.count(&self.name, None).await
    }

    pub async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Every row, in storage order
    pub async fn values(&mut self) -> Result<Vec<Vec<SqlValue>>> {
        self.db.select(&self.name, &Select::new()).await
    }

    /// Rows as `column -> value` objects
    pub async fn records(&mut self) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let names = self.column_names().await?;
        let rows = self.values().await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                names
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(serde_json::Value::from))
                    .collect()
            })
            .collect())
    }

    /// Rows matching `select`
    pub async fn select(&mut self, mut select: Select) -> Result<Vec<Vec<SqlValue>>> {
        if self.colmap.is_some() {
            if let Some(columns) = &select.columns {
                select.columns = Some(self.storage_names(columns).await?);
            }
            if let Some(condition) = &select.condition {
                select.condition = Some(self.storage_condition(condition).await?);
            }
            let mut order_by = Vec::with_capacity(select.order_by.len());
            for (column, direction) in &select.order_by {
                order_by.push((self.storage_name(column).await?, *direction));
            }
            select.order_by = order_by;
        }
        self.db.select(&self.name, &select).await
    }

    /// Number of rows matching `condition`
    pub async fn count(&mut self, condition: Option<&Condition>) -> Result<usize> {
        let condition = match condition {
            Some(condition) => Some(self.storage_condition(condition).await?),
            None => None,
        };
        self.db.count(&self.name, condition.as_ref()).await
    }

    /// Positions of the rows matching `condition`
    pub async fn index_of(&mut self, condition: &Condition) -> Result<Vec<usize>> {
        let condition = self.storage_condition(condition).await?;
        self.db.index_of(&self.name, &condition).await
    }

    /// Add a column; returns its stored name
    ///
    /// On a mapped table the values are checked before the keyword is
    /// registered, so a rejected call leaves the map untouched.
    pub async fn add_column(&mut self, column: &str, data: Option<Data>) -> Result<String> {
        let values = data.map(Data::into_values).transpose()?;
        let Some(map) = self.colmap.as_deref_mut() else {
            return self.db.add_column_values(&self.name, column, values).await;
        };

        if let Some(values) = &values {
            let length = self.db.count(&self.name, None).await?;
            if length > 0 && values.len() != length {
                return Err(DbError::shape(format!(
                    "column data has {} values but table '{}' has {} rows",
                    values.len(),
                    self.name,
                    length
                )));
            }
        }

        let taken = self.db.column_names(&self.name).await?;
        let stored = map.add_column_avoiding(self.db, column, &taken).await?;
        self.db.add_column_values(&self.name, &stored, values).await
    }

    /// Append rows; see [`Database::add_rows`]
    pub async fn add_rows(&mut self, data: impl Into<Data>, add_columns: bool) -> Result<usize> {
        let data = data.into();
        if self.colmap.is_none() {
            return self.db.add_rows(&self.name, data, add_columns).await;
        }

        if add_columns {
            if let Data::Map(entries) = &data {
                let known = self.column_names().await?;
                for (keyword, _) in entries {
                    if !known.contains(&keyword.to_lowercase()) {
                        debug!(table = %self.name, keyword = %keyword, "registering keyword");
                        self.add_column(keyword, None).await?;
                    }
                }
            }
        }

        let data = match self.colmap.as_deref_mut() {
            Some(map) => map.map_row(self.db, data, false).await?,
            None => data,
        };
        self.db.add_rows(&self.name, data, false).await
    }

    /// Overwrite the row at `index`
    ///
    /// Mapping keys must all name existing columns.
    pub async fn set_row(&mut self, index: i64, data: impl Into<Data>) -> Result<()> {
        let data = match data.into() {
            Data::Map(entries) if self.colmap.is_some() => {
                let mut mapped = Vec::with_capacity(entries.len());
                for (keyword, value) in entries {
                    mapped.push((self.storage_name(&keyword).await?, value));
                }
                Data::Map(mapped)
            }
            other => other,
        };
        self.db.set_row(&self.name, index, data).await
    }

    /// Replace every value of `column`
    pub async fn set_column(&mut self, column: &str, data: impl Into<Data>) -> Result<()> {
        let stored = self.storage_name(column).await?;
        self.db.set_column(&self.name, &stored, data).await
    }

    pub async fn delete_row(&mut self, index: i64) -> Result<()> {
        self.db.delete_row(&self.name, index).await
    }

    pub async fn delete_column(&mut self, column: &str) -> Result<()> {
        let stored = self.storage_name(column).await?;
        self.db.delete_column(&self.name, &stored).await
    }

    /// View of the row at `index` (negative counts from the end)
    pub async fn row(&mut self, index: i64) -> Result<Row<'_>> {
        let length = self.len().await?;
        let position = fix_index(index, length)?;
        Ok(Row::new(
            &mut *self.db,
            self.name.clone(),
            position,
            self.colmap.as_deref_mut(),
        ))
    }

    /// View of one column
    pub async fn column(&mut self, column: &str) -> Result<Column<'_>> {
        let stored = self.storage_name(column).await?;
        let stored = self.db.get_column_name(&self.name, &stored).await?;
        Ok(Column::new(
            &mut *self.db,
            self.name.clone(),
            stored,
            column.to_string(),
        ))
    }

    /// Read by row, column, cell, or a row selection within one column
    pub async fn get(&mut self, key: impl Into<Key>) -> Result<Selection<'_>> {
        match resolve(key.into())? {
            Address::Row(index) => Ok(Selection::Row(self.row(index).await?)),
            Address::Column(column) => Ok(Selection::Column(self.column(&column).await?)),
            Address::Cell { row, column } => {
                let stored = self.storage_name(&column).await?;
                let value = self.db.get_item(&self.name, &stored, row).await?;
                Ok(Selection::Value(value))
            }
            Address::Rows { rows, column } => {
                let stored = self.storage_name(&column).await?;
                let values = self.db.get_column_values(&self.name, &stored).await?;
                let positions = rows.positions(values.len())?;
                Ok(Selection::Values(
                    positions.into_iter().map(|p| values[p].clone()).collect(),
                ))
            }
        }
    }

    /// Write by row, column, cell, or a row selection within one column
    ///
    /// A row selection takes a list with one value per selected row, or a
    /// single value written to all of them.
    pub async fn set(&mut self, key: impl Into<Key>, value: impl Into<Data>) -> Result<()> {
        let value = value.into();
        match resolve(key.into())? {
            Address::Row(index) => self.set_row(index, value).await,
            Address::Column(column) => self.set_column(&column, value).await,
            Address::Cell { row, column } => {
                let stored = self.storage_name(&column).await?;
                self.db.set_item(&self.name, &stored, row, value).await
            }
            Address::Rows { rows, column } => {
                let stored = self.storage_name(&column).await?;
                let stored = self.db.get_column_name(&self.name, &stored).await?;
                let length = self.len().await?;
                let cells = spread(rows.positions(length)?, value)?;
                self.db.set_cells(&self.name, &stored, cells).await
            }
        }
    }

    /// One-line description with the table shape
    pub async fn summary(&mut self) -> Result<String> {
        let columns = self.column_names().await?.len();
        let rows = self.len().await?;
        Ok(format!(
            "Table '{}' in database '{}': ({} columns x {} rows)",
            self.name,
            self.db.path(),
            columns,
            rows
        ))
    }
}
