//! SQL utilities
//!
//! Provides identifier/value sanitization, WHERE-clause building and DDL
//! generation.

pub mod condition;
pub mod ddl;
pub mod sanitize;

pub use condition::{
    Condition, Criterion, Operator, Predicate, SortOrder, Where, build_order_by_clause,
    parse_where,
};
pub use ddl::DdlGenerator;
pub use sanitize::{
    B32_COL_PREFIX, ID_KEY, Sanitizer, decode_b32, encode_b32, is_simple_identifier,
    quote_identifier, sanitize_value,
};
