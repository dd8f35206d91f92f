//! sqlstream predicate model
//!
//! Typed field predicates, column types, bound values and SQL fragments.
//! Everything here is plain data: dialect rendering lives in
//! `sqlstream-dialect`, pipeline planning in `sqlstream-engine`.

mod fragment;
mod predicate;
mod schema;
mod sort;
mod types;
mod value;

pub use fragment::{count_placeholders, CompiledQuery, SqlFragment, PLACEHOLDER};
pub use predicate::{
    CompareOp, Field, FieldId, FieldPredicate, Inclusion, PredicateKind, PredicateOp, TextOp,
};
pub use schema::{ColumnInfo, ColumnResolver, TableSchema};
pub use sort::{NullsOrder, SortKey};
pub use types::{DeclaredType, ParseTypeError, TypeFamily};
pub use value::Value;
