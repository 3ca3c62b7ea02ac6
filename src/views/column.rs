use crate::database::Database;
use crate::error::Result;
use crate::index::{Key, RowSelector, resolve_column_key};
use crate::types::{Data, SqlValue};
use crate::views::{Selection, spread};

/// View of one column
#[derive(Debug)]
pub struct Column<'a> {
    db: &'a mut Database,
    table: String,
    /// Stored name
    column: String,
    /// Name the caller used
    label: String,
}

impl<'a> Column<'a> {
    pub(crate) fn new(db: &'a mut Database, table: String, column: String, label: String) -> Self {
        Self {
            db,
            table,
            column,
            label,
        }
    }

    pub fn name(&self) -> &str {
        &self.label
    }

    /// Name the engine stores this column under
    pub fn stored_name(&self) -> &str {
        &self.column
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Values in row order
    pub async fn values(&mut self) -> Result<Vec<SqlValue>> {
        self.db.get_column_values(&self.table, &self.column).await
    }

    pub async fn len(&mut self) -> Result<usize> {
        self.db.count(&self.table, None).await
    }

    pub async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn contains(&mut self, value: &SqlValue) -> Result<bool> {
        Ok(self.values().await?.contains(value))
    }

    /// Read one value by position, or several by slice or position list
    pub async fn get(&mut self, key: impl Into<Key>) -> Result<Selection<'_>> {
        let selector = resolve_column_key(key.into())?;
        let values = self.values().await?;
        let positions = selector.positions(values.len())?;
        match selector {
            RowSelector::Index(_) => Ok(Selection::Value(values[positions[0]].clone())),
            RowSelector::Slice(_) | RowSelector::Indices(_) => Ok(Selection::Values(
                positions.into_iter().map(|p| values[p].clone()).collect(),
            )),
        }
    }

    /// Write by position, slice or position list
    ///
    /// Several positions take a list of equal length or a single value
    /// written to all of them.
    pub async fn set(&mut self, key: impl Into<Key>, value: impl Into<Data>) -> Result<()> {
        let value = value.into();
        let selector = resolve_column_key(key.into())?;
        if let RowSelector::Index(index) = selector {
            return self
                .db
                .set_item(&self.table, &self.column, index, value)
                .await;
        }
        let length = self.len().await?;
        let cells = spread(selector.positions(length)?, value)?;
        self.db.set_cells(&self.table, &self.column, cells).await
    }

    /// One-line description with the column length
    pub async fn summary(&mut self) -> Result<String> {
        let rows = self.len().await?;
        Ok(format!(
            "Column {} in table '{}' ({} rows)",
            self.label, self.table, rows
        ))
    }
}
