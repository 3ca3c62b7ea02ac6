//! Table, row and column views
//!
//! Views borrow the [`Database`](crate::Database) mutably and address it by
//! table name, row position and column name. Keys are resolved with
//! [`crate::index`]; a table opened with a [`ColumnMap`](crate::ColumnMap)
//! translates keywords to stored column names before touching the engine.

mod column;
mod row;
mod table;

pub use column::Column;
pub use row::Row;
pub use table::Table;

use crate::error::{DbError, Result};
use crate::types::{Data, SqlValue};

/// Result of a multi-axis `get`
#[derive(Debug)]
pub enum Selection<'a> {
    Row(Row<'a>),
    Column(Column<'a>),
    Value(SqlValue),
    Values(Vec<SqlValue>),
}

impl<'a> Selection<'a> {
    pub fn into_value(self) -> Option<SqlValue> {
        match self {
            Selection::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<SqlValue>> {
        match self {
            Selection::Values(values) => Some(values),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<Row<'a>> {
        match self {
            Selection::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_column(self) -> Option<Column<'a>> {
        match self {
            Selection::Column(column) => Some(column),
            _ => None,
        }
    }
}

/// Pair each selected position with the value it receives
///
/// A list must hold one value per position; anything else is repeated.
pub(crate) fn spread(positions: Vec<usize>, value: Data) -> Result<Vec<(usize, SqlValue)>> {
    match value {
        Data::List(items) => {
            if items.len() != positions.len() {
                return Err(DbError::shape(format!(
                    "{} values given for {} rows",
                    items.len(),
                    positions.len()
                )));
            }
            positions
                .into_iter()
                .zip(items)
                .map(|(position, item)| Ok((position, item.into_value()?)))
                .collect()
        }
        scalar => {
            let value = scalar.into_value()?;
            Ok(positions
                .into_iter()
                .map(|position| (position, value.clone()))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spread_broadcasts_scalar() {
        let cells = spread(vec![2, 3, 4], json!(-999).into()).unwrap();
        assert_eq!(
            cells,
            vec![
                (2, SqlValue::Integer(-999)),
                (3, SqlValue::Integer(-999)),
                (4, SqlValue::Integer(-999)),
            ]
        );
    }

    #[test]
    fn test_spread_pairs_list() {
        let cells = spread(vec![0, 5], json!(["x", null]).into()).unwrap();
        assert_eq!(cells, vec![(0, SqlValue::from("x")), (5, SqlValue::Null)]);
    }

    #[test]
    fn test_spread_length_mismatch() {
        assert!(matches!(
            spread(vec![0, 1], json!([1, 2, 3]).into()),
            Err(DbError::Shape(_))
        ));
    }

    #[test]
    fn test_spread_broadcasts_bytes() {
        let cells = spread(vec![1, 2], Data::from(vec![0u8, 9])).unwrap();
        assert_eq!(
            cells,
            vec![(1, SqlValue::Blob(vec![0, 9])), (2, SqlValue::Blob(vec![0, 9]))]
        );
    }

    #[test]
    fn test_spread_rejects_nested_values() {
        assert!(matches!(
            spread(vec![0], json!({"a": 1}).into()),
            Err(DbError::UnsupportedType(_))
        ));
    }
}
