//! Condition building for SQL WHERE clauses
//!
//! A [`Where`] is one `column op value(s)` comparison rendered to a fragment
//! with `?` placeholders plus the values to bind. A [`Condition`] is what
//! callers hand to `select`/`count`/`index_of`; [`parse_where`] folds it into
//! a single fragment joined with `AND`.

use std::fmt;
use std::str::FromStr;

use crate::error::{DbError, Result};
use crate::sql::sanitize::{Sanitizer, quote_identifier, sanitize_value};
use crate::types::SqlValue;

/// Comparison operators accepted by [`Where`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
    NotIn,
    Is,
    IsNot,
    Between,
    NotBetween,
}

impl Operator {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    fn check_arity(&self, count: usize) -> Result<()> {
        let ok = if self.is_range() {
            count == 2
        } else if self.is_membership() {
            count >= 1
        } else {
            count == 1
        };

        if ok {
            return Ok(());
        }

        let expected = if self.is_range() {
            "exactly 2 values"
        } else if self.is_membership() {
            "at least 1 value"
        } else {
            "exactly 1 value"
        };
        Err(DbError::shape(format!(
            "{} requires {}, got {}",
            self.as_sql(),
            expected,
            count
        )))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        let op = match normalized.as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "LIKE" => Operator::Like,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "IS" => Operator::Is,
            "IS NOT" => Operator::IsNot,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            _ => {
                return Err(DbError::shape(format!(
                    "Operator '{}' is not supported",
                    s
                )));
            }
        };
        Ok(op)
    }
}

/// An operator with its arity-checked, sanitized values
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    op: Operator,
    values: Vec<SqlValue>,
}

impl Predicate {
    /// Build from an operator spelling and a dynamic value
    ///
    /// A JSON array supplies several values (membership and range operators),
    /// any other JSON value supplies exactly one.
    pub fn new(op: &str, values: serde_json::Value) -> Result<Self> {
        let op = op.parse::<Operator>()?;
        let values = match values {
            serde_json::Value::Array(items) => items
                .iter()
                .map(sanitize_value)
                .collect::<Result<Vec<_>>>()?,
            other => vec![sanitize_value(&other)?],
        };
        Self::from_values(op, values)
    }

    pub fn from_values(op: Operator, values: Vec<SqlValue>) -> Result<Self> {
        op.check_arity(values.len())?;
        Ok(Self { op, values })
    }

    /// Equality against a single value
    pub fn equals(value: impl Into<SqlValue>) -> Self {
        Self {
            op: Operator::Eq,
            values: vec![value.into()],
        }
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    fn render(&self, column: &str) -> (String, Vec<SqlValue>) {
        let op = self.op.as_sql();
        let fragment = if self.op.is_range() {
            format!("{} {} ? AND ?", column, op)
        } else if self.op.is_membership() {
            let placeholders = vec!["?"; self.values.len()].join(", ");
            format!("{} {} ({})", column, op, placeholders)
        } else {
            format!("{} {} ?", column, op)
        };
        (fragment, self.values.clone())
    }
}

/// One `column op value(s)` comparison
///
/// The column is emitted as literal SQL text and must already be a sanitized
/// identifier; values only ever appear as `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    column: String,
    predicate: Predicate,
}

impl Where {
    /// Build a comparison, validating the operator and the value count
    ///
    /// # Example
    /// ```
    /// use dbastable::Where;
    /// use serde_json::json;
    ///
    /// let (sql, args) = Where::new("a", "between", json!([1, 2])).unwrap().to_sql();
    /// assert_eq!(sql, "a BETWEEN ? AND ?");
    /// assert_eq!(args.len(), 2);
    /// ```
    pub fn new(column: impl Into<String>, op: &str, values: serde_json::Value) -> Result<Self> {
        Ok(Self {
            column: column.into(),
            predicate: Predicate::new(op, values)?,
        })
    }

    pub fn from_predicate(column: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            column: column.into(),
            predicate,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Render to `(fragment, bound_values)`
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        self.predicate.render(&self.column)
    }
}

/// Right-hand side of one keyed entry of a [`Condition`]
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Implicit equality against a value that still needs sanitizing
    Equals(serde_json::Value),
    /// Explicit operator and values
    Predicate(Predicate),
}

impl From<Predicate> for Criterion {
    fn from(predicate: Predicate) -> Self {
        Criterion::Predicate(predicate)
    }
}

impl From<serde_json::Value> for Criterion {
    fn from(value: serde_json::Value) -> Self {
        Criterion::Equals(value)
    }
}

/// A caller-supplied filter
///
/// Literal SQL expressions and keyed `(column, criterion)` entries, all of
/// which must hold.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    /// Literal SQL expressions
    ///
    /// Nothing in these strings is sanitized; the caller owns their safety.
    raw: Vec<String>,
    /// Ordered `(column, criterion)` pairs
    fields: Vec<(String, Criterion)>,
}

impl Condition {
    /// Empty condition, to be extended with [`Condition::filter`] and [`Condition::with`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal SQL expression
    pub fn raw(expression: impl Into<String>) -> Self {
        Self::new().and_raw(expression)
    }

    /// Keyed entries, in order
    pub fn from_fields(fields: Vec<(String, Criterion)>) -> Self {
        Self {
            raw: Vec::new(),
            fields,
        }
    }

    /// Add a literal SQL expression
    pub fn and_raw(mut self, expression: impl Into<String>) -> Self {
        self.raw.push(expression.into());
        self
    }

    /// Add an equality entry
    pub fn filter(self, column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.with(column, Criterion::Equals(value.into()))
    }

    /// Add an entry with an explicit criterion
    pub fn with(mut self, column: impl Into<String>, criterion: impl Into<Criterion>) -> Self {
        self.fields.push((column.into(), criterion.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Criterion)] {
        &self.fields
    }

    pub fn raw_expressions(&self) -> &[String] {
        &self.raw
    }

    /// Whether no filter applies
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.fields.is_empty()
    }

    /// Interpret a dynamic condition
    ///
    /// Accepted shapes: `null` (no filter), an object, a string, an array of
    /// strings, or an array of `[key, value]` pairs.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>> {
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(map) => Ok(Some(Condition::from_fields(
                map.iter()
                    .map(|(k, v)| (k.clone(), Criterion::Equals(v.clone())))
                    .collect(),
            ))),
            serde_json::Value::String(s) => Ok(Some(Condition::raw(s.clone()))),
            serde_json::Value::Array(items) => {
                if items.iter().all(|i| i.is_string()) {
                    let condition = items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .fold(Condition::new(), Condition::and_raw);
                    return Ok(Some(condition));
                }

                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_array().map(Vec::as_slice) {
                        Some([serde_json::Value::String(key), value]) => {
                            fields.push((key.clone(), Criterion::Equals(value.clone())));
                        }
                        _ => {
                            return Err(DbError::unsupported_type(format!(
                                "if where is a list, it must hold strings or [key, value] pairs. Got {}.",
                                item
                            )));
                        }
                    }
                }
                Ok(Some(Condition::from_fields(fields)))
            }
            other => Err(DbError::unsupported_type(format!(
                "where must be a string, list of strings or mapping. Got {}.",
                other
            ))),
        }
    }
}

impl From<&str> for Condition {
    fn from(expression: &str) -> Self {
        Condition::raw(expression)
    }
}

impl From<String> for Condition {
    fn from(expression: String) -> Self {
        Condition::raw(expression)
    }
}

impl From<Where> for Condition {
    fn from(clause: Where) -> Self {
        Condition::from_fields(vec![(
            clause.column,
            Criterion::Predicate(clause.predicate),
        )])
    }
}

/// Fold a condition into one `(fragment, args)` pair
///
/// Returns `None` when no filter applies. Raw expressions come first, passed
/// through untouched; keyed entries are sanitized with `sanitizer` and
/// rendered through [`Where`]. With more than one clause each raw
/// expression is parenthesized.
pub fn parse_where(
    condition: Option<&Condition>,
    sanitizer: &Sanitizer,
) -> Result<Option<(String, Vec<SqlValue>)>> {
    let Some(condition) = condition else {
        return Ok(None);
    };
    if condition.is_empty() {
        return Ok(None);
    }

    let grouped = condition.raw.len() + condition.fields.len() > 1;
    let mut clauses: Vec<String> = condition
        .raw
        .iter()
        .map(|expression| {
            if grouped {
                format!("({})", expression)
            } else {
                expression.clone()
            }
        })
        .collect();

    let mut args = Vec::new();
    for (key, criterion) in &condition.fields {
        let column = sanitizer.sanitize_key(key)?;
        let predicate = match criterion {
            Criterion::Equals(value) => Predicate::equals(sanitize_value(value)?),
            Criterion::Predicate(predicate) => predicate.clone(),
        };
        let (clause, mut values) =
            Where::from_predicate(quote_identifier(&column), predicate).to_sql();
        clauses.push(clause);
        args.append(&mut values);
    }
    Ok(Some((clauses.join(" AND "), args)))
}

/// Sort direction for [`build_order_by_clause`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(DbError::shape(format!(
                "Invalid sort order: '{}'. Must be 'asc' or 'desc'.",
                s
            ))),
        }
    }
}

/// Build ORDER BY clause (without the "ORDER BY" prefix)
///
/// Columns are sanitized and checked against `known_columns`; an empty
/// `order` falls back to the identity column so results keep storage order.
pub fn build_order_by_clause(
    order: &[(String, SortOrder)],
    known_columns: &[String],
    sanitizer: &Sanitizer,
    id_column: &str,
) -> Result<String> {
    if order.is_empty() {
        return Ok(format!("{} ASC", quote_identifier(id_column)));
    }

    let mut parts = Vec::with_capacity(order.len());
    for (field, direction) in order {
        let column = sanitizer.sanitize_key(field)?;
        if !known_columns.contains(&column) {
            return Err(DbError::not_found(format!(
                "Invalid sort field: '{}'.",
                field
            )));
        }
        let direction = match direction {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        parts.push(format!("{} {}", quote_identifier(&column), direction));
    }
    // ties keep storage order
    parts.push(format!("{} ASC", quote_identifier(id_column)));

    Ok(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Where rendering ====================

    #[test]
    fn test_where_single_value_operators() {
        for (op, sql) in [
            ("=", "a = ?"),
            ("!=", "a != ?"),
            (">", "a > ?"),
            (">=", "a >= ?"),
            ("<", "a < ?"),
            ("<=", "a <= ?"),
        ] {
            let w = Where::new("a", op, json!(1)).unwrap();
            let (clause, args) = w.to_sql();
            assert_eq!(clause, sql);
            assert_eq!(args, vec![SqlValue::Integer(1)]);
        }
    }

    #[test]
    fn test_where_single_value_arity_errors() {
        for op in ["=", "!=", ">", ">=", "<", "<=", "like"] {
            assert!(matches!(
                Where::new("a", op, json!([1, 2])),
                Err(DbError::Shape(_))
            ));
            assert!(matches!(
                Where::new("a", op, json!([])),
                Err(DbError::Shape(_))
            ));
        }
    }

    #[test]
    fn test_where_like() {
        let (clause, args) = Where::new("a", "like", json!("b")).unwrap().to_sql();
        assert_eq!(clause, "a LIKE ?");
        assert_eq!(args, vec![SqlValue::Text("b".into())]);
    }

    #[test]
    fn test_where_in() {
        let (clause, args) = Where::new("a", "in", json!([1, 2, 3])).unwrap().to_sql();
        assert_eq!(clause, "a IN (?, ?, ?)");
        assert_eq!(args.len(), 3);

        let (clause, _) = Where::new("a", "not in", json!([1, 2, 3])).unwrap().to_sql();
        assert_eq!(clause, "a NOT IN (?, ?, ?)");

        let (clause, args) = Where::new("a", "IN", json!(7)).unwrap().to_sql();
        assert_eq!(clause, "a IN (?)");
        assert_eq!(args, vec![SqlValue::Integer(7)]);
    }

    #[test]
    fn test_where_in_empty() {
        assert!(Where::new("a", "in", json!([])).is_err());
        assert!(Where::new("a", "not in", json!([])).is_err());
    }

    #[test]
    fn test_where_is_null() {
        let (clause, args) = Where::new("a", "is", json!(null)).unwrap().to_sql();
        assert_eq!(clause, "a IS ?");
        assert_eq!(args, vec![SqlValue::Null]);

        let (clause, _) = Where::new("a", "is not", json!(null)).unwrap().to_sql();
        assert_eq!(clause, "a IS NOT ?");
    }

    #[test]
    fn test_where_between_keeps_order() {
        let (clause, args) = Where::new("a", "between", json!([5, 2])).unwrap().to_sql();
        assert_eq!(clause, "a BETWEEN ? AND ?");
        assert_eq!(args, vec![SqlValue::Integer(5), SqlValue::Integer(2)]);

        let (clause, _) = Where::new("a", "not between", json!([1, 2])).unwrap().to_sql();
        assert_eq!(clause, "a NOT BETWEEN ? AND ?");
    }

    #[test]
    fn test_where_between_arity() {
        for values in [json!([1]), json!([1, 2, 3]), json!([]), json!(1)] {
            assert!(Where::new("a", "between", values.clone()).is_err());
            assert!(Where::new("a", "not between", values).is_err());
        }
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("not   in".parse::<Operator>().unwrap(), Operator::NotIn);
        assert_eq!("Is Not".parse::<Operator>().unwrap(), Operator::IsNot);
        assert_eq!("==".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::Ne);
        assert!("~".parse::<Operator>().is_err());
        assert!(Where::new("a", "contains", json!(1)).is_err());
    }

    #[test]
    fn test_where_values_never_in_fragment() {
        let nasty = "x'; DROP TABLE t; --";
        let (clause, args) = Where::new("a", "=", json!(nasty)).unwrap().to_sql();
        assert_eq!(clause, "a = ?");
        assert!(!clause.contains(nasty));
        assert_eq!(args, vec![SqlValue::Text(nasty.into())]);

        let (clause, _) = Where::new("a", "in", json!([nasty, "--"])).unwrap().to_sql();
        assert!(!clause.contains('\''));
        assert!(!clause.contains("--"));
    }

    #[test]
    fn test_where_rejects_container_values() {
        assert!(matches!(
            Where::new("a", "=", json!({"x": 1})),
            Err(DbError::UnsupportedType(_))
        ));
        assert!(matches!(
            Where::new("a", "in", json!([[1], 2])),
            Err(DbError::UnsupportedType(_))
        ));
    }

    // ==================== parse_where ====================

    #[test]
    fn test_parse_where_none() {
        let sanitizer = Sanitizer::default();
        assert!(parse_where(None, &sanitizer).unwrap().is_none());
        assert!(parse_where(Some(&Condition::new()), &sanitizer).unwrap().is_none());
    }

    #[test]
    fn test_parse_where_fields_in_order() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::new().filter("B", 2).filter("a", "x");
        let (clause, args) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "\"b\" = ? AND \"a\" = ?");
        assert_eq!(args, vec![SqlValue::Integer(2), SqlValue::Text("x".into())]);
    }

    #[test]
    fn test_parse_where_with_predicate() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::new()
            .with("a", Predicate::new(">=", json!(3)).unwrap())
            .with("b", Predicate::new("between", json!([1, 9])).unwrap());
        let (clause, args) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "\"a\" >= ? AND \"b\" BETWEEN ? AND ?");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_parse_where_sanitizes_keys() {
        let sanitizer = Sanitizer::new(true);
        let condition = Condition::new().filter("key-b", 1);
        let (clause, _) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, format!("\"{}\" = ?", crate::sql::encode_b32("key-b")));

        let strict = Sanitizer::new(false);
        assert!(matches!(
            parse_where(Some(&condition), &strict),
            Err(DbError::InvalidName(_))
        ));
    }

    #[test]
    fn test_parse_where_bad_equality_value() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::new().filter("a", json!([1, 2]));
        assert!(matches!(
            parse_where(Some(&condition), &sanitizer),
            Err(DbError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_parse_where_raw() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::raw("a > 12");
        let (clause, args) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "a > 12");
        assert!(args.is_empty());

        let condition = Condition::raw("a > 12").and_raw("b < 26 OR b > 30");
        let (clause, _) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "(a > 12) AND (b < 26 OR b > 30)");
    }

    #[test]
    fn test_parse_where_raw_with_fields() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::raw("a >= 1").filter("b", 2);
        assert_eq!(condition.raw_expressions(), ["a >= 1"]);
        assert_eq!(condition.fields().len(), 1);

        let (clause, args) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "(a >= 1) AND \"b\" = ?");
        assert_eq!(args, vec![SqlValue::Integer(2)]);

        let condition = Condition::new().filter("b", 2).and_raw("a >= 1");
        let (clause, _) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "(a >= 1) AND \"b\" = ?");
    }

    #[test]
    fn test_condition_from_json_shapes() {
        assert!(Condition::from_json(&json!(null)).unwrap().is_none());

        let c = Condition::from_json(&json!({"a": 1, "b": 2})).unwrap().unwrap();
        assert_eq!(c, Condition::new().filter("a", 1).filter("b", 2));

        let c = Condition::from_json(&json!("a > 1")).unwrap().unwrap();
        assert_eq!(c, Condition::raw("a > 1"));

        let c = Condition::from_json(&json!(["a > 1", "b < 2"])).unwrap().unwrap();
        assert_eq!(c, Condition::raw("a > 1").and_raw("b < 2"));

        let c = Condition::from_json(&json!([["a", 1], ["b", "x"]])).unwrap().unwrap();
        assert_eq!(c, Condition::new().filter("a", 1).filter("b", "x"));
    }

    #[test]
    fn test_condition_from_json_errors() {
        for bad in [json!(1), json!(true), json!([1, 2, 3]), json!([["a", 1, 2]]), json!([["a"]])] {
            assert!(matches!(
                Condition::from_json(&bad),
                Err(DbError::UnsupportedType(_))
            ));
        }
    }

    #[test]
    fn test_condition_from_where() {
        let sanitizer = Sanitizer::default();
        let condition = Condition::from(Where::new("a", "<", json!(13)).unwrap());
        let (clause, _) = parse_where(Some(&condition), &sanitizer).unwrap().unwrap();
        assert_eq!(clause, "\"a\" < ?");
    }

    // ==================== build_order_by_clause ====================

    #[test]
    fn test_order_by_default() {
        let sanitizer = Sanitizer::default();
        let clause = build_order_by_clause(&[], &[], &sanitizer, "__id__").unwrap();
        assert_eq!(clause, "\"__id__\" ASC");
    }

    #[test]
    fn test_order_by_fields() {
        let sanitizer = Sanitizer::default();
        let known = vec!["a".to_string(), "b".to_string()];
        let clause = build_order_by_clause(
            &[("B".to_string(), SortOrder::Desc), ("a".to_string(), SortOrder::Asc)],
            &known,
            &sanitizer,
            "__id__",
        )
        .unwrap();
        assert_eq!(clause, "\"b\" DESC, \"a\" ASC, \"__id__\" ASC");
    }

    #[test]
    fn test_order_by_unknown_field() {
        let sanitizer = Sanitizer::default();
        let result = build_order_by_clause(
            &[("c".to_string(), SortOrder::Asc)],
            &["a".to_string()],
            &sanitizer,
            "__id__",
        );
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("up".parse::<SortOrder>().is_err());
    }
}
