//! Multi-axis key resolution
//!
//! Tables have two axes: rows (addressed by position) and columns (addressed
//! by name). A [`Key`] is whatever a caller passes to `get`/`set`; [`resolve`]
//! turns it into one of the closed set of [`Address`] kinds before any
//! statement is built.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::error::{DbError, Result};

/// Python-style slice over row positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Self {
        Self {
            start,
            stop,
            step: None,
        }
    }

    /// Slice covering every position
    pub fn full() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Concrete positions selected from a sequence of `len` items
    ///
    /// Out-of-range bounds are clamped, negative bounds count from the end
    /// and a negative step walks backwards. A zero step is rejected.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(DbError::shape("slice step cannot be zero"));
        }

        let len = len as i64;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

        let clamp = |bound: i64| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };

        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step > 0 { lower } else { upper });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step > 0 { upper } else { lower });

        let mut positions = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            positions.push(i as usize);
            // a step past the i64 range leaves the slice
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(positions)
    }
}

impl From<Range<i64>> for Slice {
    fn from(range: Range<i64>) -> Self {
        Slice::new(Some(range.start), Some(range.end))
    }
}

impl From<RangeFrom<i64>> for Slice {
    fn from(range: RangeFrom<i64>) -> Self {
        Slice::new(Some(range.start), None)
    }
}

impl From<RangeTo<i64>> for Slice {
    fn from(range: RangeTo<i64>) -> Self {
        Slice::new(None, Some(range.end))
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::full()
    }
}

/// Map a possibly negative index into `[0, length)`
pub fn fix_index(index: i64, length: usize) -> Result<usize> {
    let fixed = if index < 0 {
        index + length as i64
    } else {
        index
    };
    if fixed < 0 || fixed >= length as i64 {
        return Err(DbError::IndexOutOfRange { index, length });
    }
    Ok(fixed as usize)
}

/// Anything accepted by `get`/`set` on a table, row or column view
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Index(i64),
    Name(String),
    Slice(Slice),
    Indices(Vec<i64>),
    Tuple(Vec<Key>),
}

impl Key {
    fn describe(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(n) => format!("'{}'", n),
            Key::Slice(s) => format!("{:?}", s),
            Key::Indices(v) => format!("{:?}", v),
            Key::Tuple(items) => format!(
                "({})",
                items.iter().map(Key::describe).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

impl From<i64> for Key {
    fn from(index: i64) -> Self {
        Key::Index(index)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        Key::Index(i64::from(index))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<Slice> for Key {
    fn from(slice: Slice) -> Self {
        Key::Slice(slice)
    }
}

impl From<Range<i64>> for Key {
    fn from(range: Range<i64>) -> Self {
        Key::Slice(range.into())
    }
}

impl From<RangeFrom<i64>> for Key {
    fn from(range: RangeFrom<i64>) -> Self {
        Key::Slice(range.into())
    }
}

impl From<RangeTo<i64>> for Key {
    fn from(range: RangeTo<i64>) -> Self {
        Key::Slice(range.into())
    }
}

impl From<RangeFull> for Key {
    fn from(range: RangeFull) -> Self {
        Key::Slice(range.into())
    }
}

impl From<Vec<i64>> for Key {
    fn from(indices: Vec<i64>) -> Self {
        Key::Indices(indices)
    }
}

impl<A: Into<Key>> From<(A,)> for Key {
    fn from((a,): (A,)) -> Self {
        Key::Tuple(vec![a.into()])
    }
}

impl<A: Into<Key>, B: Into<Key>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Key>, B: Into<Key>, C: Into<Key>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Key::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Row part of a combined key
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelector {
    Index(i64),
    Slice(Slice),
    Indices(Vec<i64>),
}

impl RowSelector {
    /// Positions selected out of `length` rows, bounds-checked
    pub fn positions(&self, length: usize) -> Result<Vec<usize>> {
        match self {
            RowSelector::Index(i) => Ok(vec![fix_index(*i, length)?]),
            RowSelector::Slice(slice) => slice.indices(length),
            RowSelector::Indices(indices) => indices
                .iter()
                .map(|i| fix_index(*i, length))
                .collect(),
        }
    }
}

/// What a table key refers to
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    /// A whole row
    Row(i64),
    /// A whole column
    Column(String),
    /// One value
    Cell { row: i64, column: String },
    /// Several rows of one column
    Rows { rows: RowSelector, column: String },
}

const TUPLE_KEY_ERR: &str =
    "tuple keys must be (column, row) or (row, column) with exactly one column name";

/// Resolve a table-level key
///
/// # Example
/// ```
/// use dbastable::index::{resolve, Address, Key};
///
/// let address = resolve(Key::from((2, "a"))).unwrap();
/// assert_eq!(address, Address::Cell { row: 2, column: "a".to_string() });
/// ```
pub fn resolve(key: Key) -> Result<Address> {
    match key {
        Key::Index(i) => Ok(Address::Row(i)),
        Key::Name(name) => Ok(Address::Column(name)),
        Key::Tuple(mut items) => match items.len() {
            1 => resolve(items.remove(0)),
            2 => {
                let second = items.remove(1);
                let first = items.remove(0);
                let (column, row) = match (first, second) {
                    (Key::Name(_), Key::Name(_)) => {
                        return Err(DbError::invalid_key(TUPLE_KEY_ERR));
                    }
                    (Key::Name(column), row) | (row, Key::Name(column)) => (column, row),
                    _ => return Err(DbError::invalid_key(TUPLE_KEY_ERR)),
                };
                match row {
                    Key::Index(i) => Ok(Address::Cell { row: i, column }),
                    Key::Slice(s) => Ok(Address::Rows {
                        rows: RowSelector::Slice(s),
                        column,
                    }),
                    Key::Indices(v) => Ok(Address::Rows {
                        rows: RowSelector::Indices(v),
                        column,
                    }),
                    _ => Err(DbError::invalid_key(TUPLE_KEY_ERR)),
                }
            }
            n => Err(DbError::invalid_key(format!(
                "a table has two axes, got a key with {} items",
                n
            ))),
        },
        other @ (Key::Slice(_) | Key::Indices(_)) => Err(DbError::invalid_key(format!(
            "{} selects rows but names no column",
            other.describe()
        ))),
    }
}

/// Resolve a key applied to a single column's values
pub fn resolve_column_key(key: Key) -> Result<RowSelector> {
    match key {
        Key::Index(i) => Ok(RowSelector::Index(i)),
        Key::Slice(s) => Ok(RowSelector::Slice(s)),
        Key::Indices(v) => Ok(RowSelector::Indices(v)),
        other => Err(DbError::invalid_key(format!(
            "{} cannot index a column",
            other.describe()
        ))),
    }
}

/// What a row key refers to
#[derive(Debug, Clone, PartialEq)]
pub enum RowKey {
    Offset(i64),
    Column(String),
}

/// Resolve a key applied to a single row
pub fn resolve_row_key(key: Key) -> Result<RowKey> {
    match key {
        Key::Index(i) => Ok(RowKey::Offset(i)),
        Key::Name(name) => Ok(RowKey::Column(name)),
        other => Err(DbError::invalid_key(format!(
            "{} cannot index a row",
            other.describe()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // fix_index Tests
    // =========================================================================

    #[test]
    fn test_fix_index_wraparound() {
        assert_eq!(fix_index(0, 10).unwrap(), 0);
        assert_eq!(fix_index(9, 10).unwrap(), 9);
        assert_eq!(fix_index(-1, 10).unwrap(), 9);
        assert_eq!(fix_index(-10, 10).unwrap(), 0);
    }

    #[test]
    fn test_fix_index_out_of_range() {
        assert!(matches!(
            fix_index(10, 10),
            Err(DbError::IndexOutOfRange { index: 10, length: 10 })
        ));
        assert!(matches!(
            fix_index(-11, 10),
            Err(DbError::IndexOutOfRange { index: -11, .. })
        ));
        assert!(fix_index(0, 0).is_err());
    }

    // =========================================================================
    // Slice Tests
    // =========================================================================

    #[test]
    fn test_slice_basic() {
        assert_eq!(Slice::new(None, Some(2)).indices(10).unwrap(), vec![0, 1]);
        assert_eq!(Slice::new(Some(-2), None).indices(10).unwrap(), vec![8, 9]);
        assert_eq!(Slice::new(Some(2), Some(5)).indices(10).unwrap(), vec![2, 3, 4]);
        assert_eq!(Slice::full().indices(3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_slice_reverse() {
        assert_eq!(
            Slice::full().with_step(-1).indices(5).unwrap(),
            vec![4, 3, 2, 1, 0]
        );
        assert_eq!(
            Slice::new(Some(3), Some(0)).with_step(-2).indices(5).unwrap(),
            vec![3, 1]
        );
    }

    #[test]
    fn test_slice_clamps() {
        assert_eq!(Slice::new(Some(8), Some(100)).indices(10).unwrap(), vec![8, 9]);
        assert_eq!(Slice::new(Some(-100), Some(1)).indices(10).unwrap(), vec![0]);
        assert!(Slice::new(Some(5), Some(2)).indices(10).unwrap().is_empty());
    }

    #[test]
    fn test_slice_extreme_steps() {
        assert_eq!(
            Slice::new(Some(4), None).with_step(i64::MAX).indices(10).unwrap(),
            vec![4]
        );
        assert_eq!(
            Slice::new(Some(4), None).with_step(i64::MIN).indices(10).unwrap(),
            vec![4]
        );
        assert_eq!(
            Slice::full().with_step(i64::MIN).indices(3).unwrap(),
            vec![2]
        );
    }

    #[test]
    fn test_slice_zero_step() {
        assert!(matches!(
            Slice::full().with_step(0).indices(3),
            Err(DbError::Shape(_))
        ));
    }

    #[test]
    fn test_slice_from_ranges() {
        assert_eq!(Slice::from(2i64..5), Slice::new(Some(2), Some(5)));
        assert_eq!(Slice::from(2i64..), Slice::new(Some(2), None));
        assert_eq!(Slice::from(..5i64), Slice::new(None, Some(5)));
        assert_eq!(Slice::from(..), Slice::full());
    }

    // =========================================================================
    // resolve Tests
    // =========================================================================

    #[test]
    fn test_resolve_scalars() {
        assert_eq!(resolve(Key::from(3)).unwrap(), Address::Row(3));
        assert_eq!(resolve(Key::from("a")).unwrap(), Address::Column("a".into()));
    }

    #[test]
    fn test_resolve_one_tuple_unwraps() {
        assert_eq!(resolve(Key::from((3,))).unwrap(), Address::Row(3));
        assert_eq!(resolve(Key::from(("a",))).unwrap(), Address::Column("a".into()));
    }

    #[test]
    fn test_resolve_pair_either_order() {
        let expected = Address::Cell {
            row: -1,
            column: "b".into(),
        };
        assert_eq!(resolve(Key::from(("b", -1))).unwrap(), expected);
        assert_eq!(resolve(Key::from((-1, "b"))).unwrap(), expected);
    }

    #[test]
    fn test_resolve_pair_batches() {
        assert_eq!(
            resolve(Key::from((2i64..5, "a"))).unwrap(),
            Address::Rows {
                rows: RowSelector::Slice(Slice::new(Some(2), Some(5))),
                column: "a".into()
            }
        );
        assert_eq!(
            resolve(Key::from(("a", vec![1i64, 3]))).unwrap(),
            Address::Rows {
                rows: RowSelector::Indices(vec![1, 3]),
                column: "a".into()
            }
        );
    }

    #[test]
    fn test_resolve_pair_errors() {
        assert!(matches!(resolve(Key::from((1, 2))), Err(DbError::InvalidKey(_))));
        assert!(matches!(resolve(Key::from(("a", "b"))), Err(DbError::InvalidKey(_))));
        assert!(matches!(
            resolve(Key::from(("a", ("b", 1)))),
            Err(DbError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resolve_too_many_axes() {
        assert!(matches!(
            resolve(Key::from(("a", 1, 2))),
            Err(DbError::InvalidKey(_))
        ));
        assert!(matches!(resolve(Key::Tuple(vec![])), Err(DbError::InvalidKey(_))));
    }

    #[test]
    fn test_resolve_bare_batches_rejected() {
        assert!(matches!(resolve(Key::from(1i64..3)), Err(DbError::InvalidKey(_))));
        assert!(matches!(resolve(Key::from(vec![1i64, 2])), Err(DbError::InvalidKey(_))));
    }

    #[test]
    fn test_resolve_column_and_row_keys() {
        assert_eq!(resolve_column_key(Key::from(1)).unwrap(), RowSelector::Index(1));
        assert!(resolve_column_key(Key::from("a")).is_err());
        assert!(resolve_column_key(Key::from((1,))).is_err());

        assert_eq!(resolve_row_key(Key::from(-1)).unwrap(), RowKey::Offset(-1));
        assert_eq!(resolve_row_key(Key::from("a")).unwrap(), RowKey::Column("a".into()));
        assert!(resolve_row_key(Key::from(0i64..1)).is_err());
    }

    #[test]
    fn test_row_selector_positions() {
        assert_eq!(RowSelector::Index(-1).positions(4).unwrap(), vec![3]);
        assert_eq!(
            RowSelector::Indices(vec![-2, 0]).positions(4).unwrap(),
            vec![2, 0]
        );
        assert!(RowSelector::Indices(vec![4]).positions(4).is_err());
        assert_eq!(
            RowSelector::Slice(Slice::from(1i64..3)).positions(4).unwrap(),
            vec![1, 2]
        );
    }
}
