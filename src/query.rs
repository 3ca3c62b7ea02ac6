//! Select request for reading rows out of a table
//!
//! A [`Select`] names the columns to return, an optional [`Condition`],
//! the sort order and pagination. It is consumed by
//! [`Database::select`](crate::Database::select) and by the table views.

use crate::error::{DbError, Result};
use crate::sql::{Condition, SortOrder};

/// Request for [`Database::select`](crate::Database::select)
#[derive(Debug, Clone, Default)]
pub struct Select {
    /// Columns to return; `None` selects every user column
    pub columns: Option<Vec<String>>,
    /// Filter condition
    pub condition: Option<Condition>,
    /// Fields to sort by, each with its direction
    pub order_by: Vec<(String, SortOrder)>,
    /// Maximum number of rows to return
    pub limit: Option<i64>,
    /// Number of rows to skip; only valid together with `limit`
    pub offset: Option<i64>,
}

impl Select {
    /// Create a request selecting every row and column
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the condition
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Append an ascending sort field
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), SortOrder::Asc));
        self
    }

    /// Append a descending sort field
    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push((column.into(), SortOrder::Desc));
        self
    }

    /// Set sorting from parallel field/direction lists
    pub fn with_sort(mut self, sort_by: Vec<String>, sort_order: Vec<String>) -> Result<Self> {
        if sort_by.len() != sort_order.len() {
            return Err(DbError::shape(format!(
                "sort fields and sort orders differ in length: {} vs {}",
                sort_by.len(),
                sort_order.len()
            )));
        }
        for (field, order) in sort_by.into_iter().zip(sort_order) {
            self.order_by.push((field, order.parse()?));
        }
        Ok(self)
    }

    /// Set the row limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render the `LIMIT`/`OFFSET` tail and its arguments
    pub(crate) fn pagination(&self) -> Result<(String, Vec<i64>)> {
        match (self.limit, self.offset) {
            (None, None) => Ok((String::new(), Vec::new())),
            (Some(limit), None) => Ok((" LIMIT ?".to_string(), vec![limit])),
            (Some(limit), Some(offset)) => {
                Ok((" LIMIT ? OFFSET ?".to_string(), vec![limit, offset]))
            }
            (None, Some(_)) => Err(DbError::shape("offset cannot be used without limit")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let select = Select::new()
            .columns(["a", "b"])
            .filter("a > 1")
            .order_by_desc("b")
            .limit(5)
            .offset(2);

        assert_eq!(
            select.columns,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(select.condition.is_some());
        assert_eq!(select.order_by, vec![("b".to_string(), SortOrder::Desc)]);
        assert_eq!(select.limit, Some(5));
        assert_eq!(select.offset, Some(2));
    }

    #[test]
    fn test_with_sort_parses_directions() {
        let select = Select::new()
            .with_sort(
                vec!["a".to_string(), "b".to_string()],
                vec!["desc".to_string(), "ASC".to_string()],
            )
            .unwrap();
        assert_eq!(
            select.order_by,
            vec![
                ("a".to_string(), SortOrder::Desc),
                ("b".to_string(), SortOrder::Asc)
            ]
        );
    }

    #[test]
    fn test_with_sort_length_mismatch() {
        let result = Select::new().with_sort(vec!["a".to_string()], vec![]);
        assert!(matches!(result, Err(DbError::Shape(_))));
    }

    #[test]
    fn test_pagination() {
        assert_eq!(Select::new().pagination().unwrap(), (String::new(), vec![]));
        assert_eq!(
            Select::new().limit(3).pagination().unwrap(),
            (" LIMIT ?".to_string(), vec![3])
        );
        assert_eq!(
            Select::new().limit(3).offset(1).pagination().unwrap(),
            (" LIMIT ? OFFSET ?".to_string(), vec![3, 1])
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let result = Select::new().offset(1).pagination();
        assert!(matches!(result, Err(DbError::Shape(_))));
    }
}
