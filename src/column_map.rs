//! Keyword to column indirection
//!
//! A [`ColumnMap`] stores `(keyword, column)` pairs in a two-column table of
//! the same database. Keywords are arbitrary case-folded strings; columns are
//! generated `col_<n>` names that always pass the simple-identifier grammar.
//!
//! Lookups are served from an in-memory copy of the map table. The copy is
//! dropped, and the generation counter bumped, by every call that writes to
//! the map table. Each call takes the map and the database by `&mut`, so a
//! lookup never runs concurrently with a write.

use tracing::{debug, info};

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::query::Select;
use crate::sql::condition::Condition;
use crate::sql::sanitize::{B32_COL_PREFIX, ID_KEY};
use crate::types::Data;

const COLUMN_PREFIX: &str = "col_";

#[derive(Debug, Clone, Default)]
struct MapCache {
    keywords: Vec<String>,
    columns: Vec<String>,
}

/// Keyword to generated-column mapping backed by a table
#[derive(Debug, Clone)]
pub struct ColumnMap {
    map_table: String,
    key_column: String,
    value_column: String,
    cache: Option<MapCache>,
    generation: u64,
}

impl ColumnMap {
    /// Map stored in `map_table`, keywords in `key_column`, generated names
    /// in `value_column`
    ///
    /// The table is not touched until the first lookup.
    pub fn new(
        map_table: impl Into<String>,
        key_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            map_table: map_table.into(),
            key_column: key_column.into(),
            value_column: value_column.into(),
            cache: None,
            generation: 0,
        }
    }

    /// Like [`ColumnMap::new`], creating the map table when it is missing
    pub async fn create(
        db: &mut Database,
        map_table: impl Into<String>,
        key_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Result<Self> {
        let map = Self::new(map_table, key_column, value_column);
        if !db.has_table(&map.map_table).await? {
            db.add_table_with_columns(&map.map_table, &[&map.key_column, &map.value_column])
                .await?;
        }
        Ok(map)
    }

    /// Name of the backing table
    pub fn map_table(&self) -> &str {
        &self.map_table
    }

    /// Number of cache invalidations so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn invalidate(&mut self) {
        self.cache = None;
        self.generation += 1;
    }

    async fn load(&mut self, db: &mut Database) -> Result<&MapCache> {
        match self.cache {
            Some(ref cache) => Ok(cache),
            None => {
                let select =
                    Select::new().columns([self.key_column.as_str(), self.value_column.as_str()]);
                let rows = db.select(&self.map_table, &select).await?;

                let mut cache = MapCache::default();
                for row in rows {
                    let mut values = row.into_iter();
                    let (Some(keyword), Some(column)) = (values.next(), values.next()) else {
                        continue;
                    };
                    match (keyword.as_str(), column.as_str()) {
                        (Some(keyword), Some(column)) => {
                            cache.keywords.push(keyword.to_string());
                            cache.columns.push(column.to_string());
                        }
                        _ => {
                            return Err(DbError::unsupported_type(format!(
                                "map table '{}' holds a non-text entry: ({}, {})",
                                self.map_table, keyword, column
                            )));
                        }
                    }
                }

                debug!(
                    map_table = %self.map_table,
                    entries = cache.keywords.len(),
                    "column map loaded"
                );
                Ok(self.cache.insert(cache))
            }
        }
    }

    /// Every keyword, in insertion order
    pub async fn keywords(&mut self, db: &mut Database) -> Result<Vec<String>> {
        Ok(self.load(db).await?.keywords.clone())
    }

    /// Every generated column name, in insertion order
    pub async fn columns(&mut self, db: &mut Database) -> Result<Vec<String>> {
        Ok(self.load(db).await?.columns.clone())
    }

    /// Register `keyword` and return its new column name
    pub async fn add_column(&mut self, db: &mut Database, keyword: &str) -> Result<String> {
        self.add_column_avoiding(db, keyword, &[]).await
    }

    /// Register `keyword`, never generating a name listed in `taken`
    pub(crate) async fn add_column_avoiding(
        &mut self,
        db: &mut Database,
        keyword: &str,
        taken: &[String],
    ) -> Result<String> {
        let keyword = keyword.to_lowercase();
        if keyword == ID_KEY || keyword.starts_with(B32_COL_PREFIX) {
            return Err(DbError::protected_name(format!(
                "Keyword '{}' is reserved",
                keyword
            )));
        }

        let cache = self.load(db).await?;
        if cache.keywords.contains(&keyword) {
            return Err(DbError::conflict(format!("'{}' already exists", keyword)));
        }

        let mut n = 1;
        let column = loop {
            let candidate = format!("{}{}", COLUMN_PREFIX, n);
            if !cache.columns.contains(&candidate) && !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };

        let row = Data::Map(vec![
            (self.key_column.clone(), Data::from(keyword.as_str())),
            (self.value_column.clone(), Data::from(column.as_str())),
        ]);
        db.add_rows(&self.map_table, row, false).await?;
        self.invalidate();

        info!(map_table = %self.map_table, keyword = %keyword, column = %column, "keyword mapped");
        Ok(column)
    }

    /// Column name for `keyword`
    ///
    /// Unknown keywords are registered when `add_columns` is set.
    pub async fn get_column_name(
        &mut self,
        db: &mut Database,
        keyword: &str,
        add_columns: bool,
    ) -> Result<String> {
        let folded = keyword.to_lowercase();
        let cache = self.load(db).await?;
        if let Some(i) = cache.keywords.iter().position(|k| *k == folded) {
            return Ok(cache.columns[i].clone());
        }
        if add_columns {
            return self.add_column(db, &folded).await;
        }
        Err(DbError::not_found(format!("Keyword '{}' is not mapped", keyword)))
    }

    /// Column names for several keywords, in the given order
    pub async fn get_column_names<S: AsRef<str>>(
        &mut self,
        db: &mut Database,
        keywords: &[S],
        add_columns: bool,
    ) -> Result<Vec<String>> {
        let mut columns = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            columns.push(self.get_column_name(db, keyword.as_ref(), add_columns).await?);
        }
        Ok(columns)
    }

    /// Keyword mapped to `column`
    pub async fn get_keyword(&mut self, db: &mut Database, column: &str) -> Result<String> {
        let folded = column.to_lowercase();
        let cache = self.load(db).await?;
        cache
            .columns
            .iter()
            .position(|c| *c == folded)
            .map(|i| cache.keywords[i].clone())
            .ok_or_else(|| DbError::not_found(format!("Column '{}' is not mapped", column)))
    }

    /// Keywords for several columns, in the given order
    pub async fn get_keywords<S: AsRef<str>>(
        &mut self,
        db: &mut Database,
        columns: &[S],
    ) -> Result<Vec<String>> {
        let mut keywords = Vec::with_capacity(columns.len());
        for column in columns {
            keywords.push(self.get_keyword(db, column.as_ref()).await?);
        }
        Ok(keywords)
    }

    /// Rewrite the keys of a row payload from keywords to column names
    ///
    /// Mapping keys that are not registered are dropped unless
    /// `add_columns` is set. Positional lists pass through unchanged.
    pub async fn map_row(
        &mut self,
        db: &mut Database,
        data: impl Into<Data>,
        add_columns: bool,
    ) -> Result<Data> {
        match data.into() {
            Data::Map(entries) => {
                let known = self.keywords(db).await?;
                let mut mapped = Vec::with_capacity(entries.len());
                for (keyword, value) in entries {
                    if add_columns || known.contains(&keyword.to_lowercase()) {
                        let column = self.get_column_name(db, &keyword, add_columns).await?;
                        mapped.push((column, value));
                    }
                }
                Ok(Data::Map(mapped))
            }
            list @ Data::List(_) => Ok(list),
            Data::Value(value) => Err(DbError::unsupported_type(format!(
                "row must be a mapping or a list, got {}",
                value
            ))),
        }
    }

    /// Rewrite the keys of a keyed condition from keywords to column names
    ///
    /// Raw expressions cannot be translated and are rejected.
    pub async fn parse_where(
        &mut self,
        db: &mut Database,
        condition: &Condition,
    ) -> Result<Condition> {
        if !condition.raw_expressions().is_empty() {
            return Err(DbError::unsupported_type(
                "keyword-mapped tables only accept keyed conditions",
            ));
        }
        let mut mapped = Vec::with_capacity(condition.fields().len());
        for (keyword, criterion) in condition.fields() {
            let column = self.get_column_name(db, keyword, false).await?;
            mapped.push((column, criterion.clone()));
        }
        Ok(Condition::from_fields(mapped))
    }
}
