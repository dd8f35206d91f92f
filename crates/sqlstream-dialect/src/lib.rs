//! SQL dialects for sqlstream
//!
//! Renders field predicates to parameterized SQL fragments and describes
//! per-product syntax: quoting, skip/limit windows, null ordering and
//! sub-query aliases.

pub mod descriptor;
pub mod presets;
pub mod render;

pub use descriptor::{
    DialectBuilder, DialectDescriptor, NullOrdering, SkipLimitStyle, SkipLimitSupport,
    SubqueryAlias,
};
pub use render::{
    like_pattern, render_predicate, ColumnRef, DefaultRenderer, MySqlRenderer, PostgresRenderer,
    PredicateRenderer, RenderError,
};
