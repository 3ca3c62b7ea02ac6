use crate::column_map::ColumnMap;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::index::{Key, RowKey, fix_index, resolve_row_key};
use crate::types::{Data, SqlValue};

/// View of one row, pinned to its position
#[derive(Debug)]
pub struct Row<'a> {
    db: &'a mut Database,
    table: String,
    index: usize,
    colmap: Option<&'a mut ColumnMap>,
}

impl<'a> Row<'a> {
    pub(crate) fn new(
        db: &'a mut Database,
        table: String,
        index: usize,
        colmap: Option<&'a mut ColumnMap>,
    ) -> Self {
        Self {
            db,
            table,
            index,
            colmap,
        }
    }

    /// Position of this row in storage order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn offset(&self) -> i64 {
        self.index as i64
    }

    async fn storage_name(&mut self, column: &str) -> Result<String> {
        match self.colmap.as_deref_mut() {
            Some(map) => map.get_column_name(self.db, column, false).await,
            None => Ok(column.to_string()),
        }
    }

    pub async fn column_names(&mut self) -> Result<Vec<String>> {
        let stored = self.db.column_names(&self.table).await?;
        match self.colmap.as_deref_mut() {
            Some(map) => map.get_keywords(self.db, &stored).await,
            None => stored
                .iter()
                .map(|c| self.db.sanitizer().display_name(c))
                .collect(),
        }
    }

    /// Values in column order
    pub async fn values(&mut self) -> Result<Vec<SqlValue>> {
        self.db.get_row_values(&self.table, self.offset()).await
    }

    /// `(column, value)` pairs in column order
    pub async fn items(&mut self) -> Result<Vec<(String, SqlValue)>> {
        let names = self.column_names().await?;
        let values = self.values().await?;
        Ok(names.into_iter().zip(values).collect())
    }

    pub async fn contains(&mut self, value: &SqlValue) -> Result<bool> {
        Ok(self.values().await?.contains(value))
    }

    /// Read one value by column name or by offset within the row
    pub async fn get(&mut self, key: impl Into<Key>) -> Result<SqlValue> {
        match resolve_row_key(key.into())? {
            RowKey::Offset(offset) => {
                let mut values = self.values().await?;
                let position = fix_index(offset, values.len())?;
                Ok(values.swap_remove(position))
            }
            RowKey::Column(column) => {
                let stored = self.storage_name(&column).await?;
                self.db.get_item(&self.table, &stored, self.offset()).await
            }
        }
    }

    /// Write one value; only column names are assignable
    pub async fn set(&mut self, key: impl Into<Key>, value: impl Into<Data>) -> Result<()> {
        match resolve_row_key(key.into())? {
            RowKey::Column(column) => {
                let stored = self.storage_name(&column).await?;
                self.db
                    .set_item(&self.table, &stored, self.offset(), value)
                    .await
            }
            RowKey::Offset(offset) => Err(DbError::invalid_key(format!(
                "row values are assigned by column name, got offset {}",
                offset
            ))),
        }
    }

    /// One-line description with the row contents
    pub async fn summary(&mut self) -> Result<String> {
        let items: serde_json::Map<String, serde_json::Value> = self
            .items()
            .await?
            .into_iter()
            .map(|(name, value)| (name, serde_json::Value::from(value)))
            .collect();
        Ok(format!(
            "Row {} in table '{}' {}",
            self.index,
            self.table,
            serde_json::Value::Object(items)
        ))
    }
}
