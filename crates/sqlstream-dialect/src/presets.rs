//! Built-in dialects

use sqlstream_ir::TypeFamily;

use crate::descriptor::{
    DialectDescriptor, NullOrdering, SkipLimitStyle, SkipLimitSupport, SubqueryAlias,
};
use crate::render::{MySqlRenderer, PostgresRenderer};

/// ANSI quoting, no skip/limit pushdown, trailing null ordering.
pub fn generic() -> DialectDescriptor {
    DialectDescriptor::builder("generic").build()
}

pub fn duckdb() -> DialectDescriptor {
    DialectDescriptor::builder("duckdb")
        .skip_limit(SkipLimitSupport::Standard, SkipLimitStyle::LimitOffset)
        .returning(true)
        .build()
}

pub fn postgres() -> DialectDescriptor {
    DialectDescriptor::builder("postgres")
        .skip_limit(SkipLimitSupport::Standard, SkipLimitStyle::LimitOffset)
        .returning(true)
        .renderer(PostgresRenderer)
        .build()
}

pub fn mysql() -> DialectDescriptor {
    DialectDescriptor::builder("mysql")
        .quotes('`', '`')
        .skip_limit(SkipLimitSupport::Standard, SkipLimitStyle::MySqlLimit)
        .null_ordering(NullOrdering::Pre)
        .without_type(TypeFamily::Uuid)
        .renderer(MySqlRenderer)
        .build()
}

pub fn sqlserver() -> DialectDescriptor {
    DialectDescriptor::builder("sqlserver")
        .quotes('[', ']')
        .skip_limit(SkipLimitSupport::OnlyAfterSort, SkipLimitStyle::OffsetFetch)
        .null_ordering(NullOrdering::PreWithCase)
        .build()
}

pub fn oracle() -> DialectDescriptor {
    DialectDescriptor::builder("oracle")
        .skip_limit(SkipLimitSupport::Standard, SkipLimitStyle::OffsetFetch)
        .subquery_alias(SubqueryAlias::Prohibited)
        .without_type(TypeFamily::Boolean)
        .build()
}

/// Look up a preset by name (case-insensitive). `postgresql` and `mssql`
/// are accepted as aliases.
pub fn by_name(name: &str) -> Option<DialectDescriptor> {
    match name.to_ascii_lowercase().as_str() {
        "generic" => Some(generic()),
        "duckdb" => Some(duckdb()),
        "postgres" | "postgresql" => Some(postgres()),
        "mysql" => Some(mysql()),
        "sqlserver" | "mssql" => Some(sqlserver()),
        "oracle" => Some(oracle()),
        _ => None,
    }
}

/// Every preset, in a fixed order.
pub fn all() -> Vec<DialectDescriptor> {
    vec![generic(), duckdb(), postgres(), mysql(), sqlserver(), oracle()]
}
