//! Dialect descriptors
//!
//! A [`DialectDescriptor`] is the static description of one SQL product:
//! identifier quoting, skip/limit syntax, sub-query alias policy, null
//! ordering, the column types it can compare, and the predicate renderer.
//! Descriptors hold no per-query state and are shared freely between
//! threads.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use sqlstream_ir::{
    DeclaredType, FieldPredicate, NullsOrder, SortKey, SqlFragment, TypeFamily, Value,
};
use tracing::debug;

use crate::render::{ColumnRef, DefaultRenderer, PredicateRenderer, RenderError};

/// Where a skip/limit window may be pushed into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipLimitSupport {
    Standard,
    /// Only after an `ORDER BY` (SQL Server's `OFFSET ... FETCH`)
    OnlyAfterSort,
    None,
}

/// Textual form of a pushed skip/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipLimitStyle {
    /// `LIMIT ? OFFSET ?`
    LimitOffset,
    /// `LIMIT ?, ?` with the offset first
    MySqlLimit,
    /// `OFFSET ? ROWS FETCH NEXT ? ROWS ONLY`
    OffsetFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryAlias {
    Required,
    Prohibited,
}

/// How explicit null placement is spelled in `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    /// Leading `col IS NULL` key
    Pre,
    /// Leading `CASE WHEN col IS NULL ...` key
    PreWithCase,
    /// Trailing `NULLS FIRST` / `NULLS LAST`
    Post,
}

// MySQL has no "offset only" form; the manual recommends the largest
// BIGINT UNSIGNED as the row count.
const MYSQL_UNBOUNDED: &str = "18446744073709551615";

#[derive(Clone)]
pub struct DialectDescriptor {
    name: String,
    quote_open: char,
    quote_close: char,
    delimiter: String,
    skip_limit: SkipLimitSupport,
    skip_limit_style: SkipLimitStyle,
    subquery_alias: SubqueryAlias,
    null_ordering: NullOrdering,
    supported_types: HashSet<TypeFamily>,
    returning: bool,
    renderer: Arc<dyn PredicateRenderer>,
}

impl fmt::Debug for DialectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectDescriptor")
            .field("name", &self.name)
            .field("skip_limit", &self.skip_limit)
            .field("subquery_alias", &self.subquery_alias)
            .field("null_ordering", &self.null_ordering)
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

impl DialectDescriptor {
    pub fn builder(name: impl Into<String>) -> DialectBuilder {
        DialectBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skip_limit_support(&self) -> SkipLimitSupport {
        self.skip_limit
    }

    pub fn subquery_alias(&self) -> SubqueryAlias {
        self.subquery_alias
    }

    pub fn null_ordering(&self) -> NullOrdering {
        self.null_ordering
    }

    pub fn supports_returning(&self) -> bool {
        self.returning
    }

    pub fn renderer(&self) -> &dyn PredicateRenderer {
        self.renderer.as_ref()
    }

    /// Quote an identifier, doubling any embedded closing quote.
    pub fn quote_identifier(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(self.quote_open);
        for c in ident.chars() {
            if c == self.quote_close {
                out.push(c);
            }
            out.push(c);
        }
        out.push(self.quote_close);
        out
    }

    pub fn qualified_name(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}{}{}",
                self.quote_identifier(schema),
                self.delimiter,
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    pub fn supports(&self, declared: &DeclaredType) -> bool {
        self.supported_types.contains(&declared.family())
    }

    pub fn render_predicate(
        &self,
        predicate: &FieldPredicate,
        column: ColumnRef<'_>,
    ) -> Result<SqlFragment, RenderError> {
        self.renderer.render(predicate, column)
    }

    /// Whether a window may be pushed at a point where `sorted` tells if an
    /// `ORDER BY` has already been pushed.
    pub fn can_apply_skip_limit(&self, sorted: bool) -> bool {
        let allowed = match self.skip_limit {
            SkipLimitSupport::Standard => true,
            SkipLimitSupport::OnlyAfterSort => sorted,
            SkipLimitSupport::None => false,
        };
        if !allowed {
            debug!(
                dialect = %self.name,
                support = ?self.skip_limit,
                sorted,
                "Skip/limit not expressible in SQL"
            );
        }
        allowed
    }

    /// Append a skip/limit window to a statement. `skip == 0` adds no
    /// offset and `limit == u64::MAX` adds no limit.
    pub fn apply_skip_limit(&self, fragment: SqlFragment, skip: u64, limit: u64) -> SqlFragment {
        let bounded = limit != u64::MAX;
        if skip == 0 && !bounded {
            return fragment;
        }

        let (mut sql, mut params) = fragment.into_parts();
        let skip_param = Value::Int(clamp(skip));
        let limit_param = Value::Int(clamp(limit));

        match self.skip_limit_style {
            SkipLimitStyle::LimitOffset => {
                if bounded {
                    sql.push_str(" LIMIT ?");
                    params.push(limit_param);
                }
                if skip > 0 {
                    sql.push_str(" OFFSET ?");
                    params.push(skip_param);
                }
            }
            SkipLimitStyle::MySqlLimit => match (skip > 0, bounded) {
                (true, true) => {
                    sql.push_str(" LIMIT ?, ?");
                    params.push(skip_param);
                    params.push(limit_param);
                }
                (true, false) => {
                    sql.push_str(&format!(" LIMIT ?, {MYSQL_UNBOUNDED}"));
                    params.push(skip_param);
                }
                (false, _) => {
                    sql.push_str(" LIMIT ?");
                    params.push(limit_param);
                }
            },
            SkipLimitStyle::OffsetFetch => {
                // FETCH is only valid after OFFSET
                sql.push_str(" OFFSET ? ROWS");
                params.push(skip_param);
                if bounded {
                    sql.push_str(" FETCH NEXT ? ROWS ONLY");
                    params.push(limit_param);
                }
            }
        }

        SqlFragment::new(sql, params)
    }

    /// One `ORDER BY` term with explicit null placement.
    pub fn order_term(&self, column: &str, key: &SortKey) -> String {
        let dir = if key.descending { "DESC" } else { "ASC" };
        match self.null_ordering {
            NullOrdering::Post => {
                let nulls = match key.nulls {
                    NullsOrder::First => "NULLS FIRST",
                    NullsOrder::Last => "NULLS LAST",
                };
                format!("{column} {dir} {nulls}")
            }
            NullOrdering::Pre => {
                let nulls = match key.nulls {
                    NullsOrder::First => "DESC",
                    NullsOrder::Last => "ASC",
                };
                format!("{column} IS NULL {nulls}, {column} {dir}")
            }
            NullOrdering::PreWithCase => {
                let nulls = match key.nulls {
                    NullsOrder::First => "DESC",
                    NullsOrder::Last => "ASC",
                };
                format!("CASE WHEN {column} IS NULL THEN 1 ELSE 0 END {nulls}, {column} {dir}")
            }
        }
    }

    /// `ORDER BY` clause (with a leading space) for resolved columns, or an
    /// empty string when there are no keys.
    pub fn order_by<'a>(&self, keys: impl IntoIterator<Item = (&'a str, &'a SortKey)>) -> String {
        let terms: Vec<String> = keys
            .into_iter()
            .map(|(column, key)| self.order_term(column, key))
            .collect();
        if terms.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", terms.join(", "))
        }
    }

    /// Wrap a statement as a derived table following the alias policy.
    pub fn derived_table(&self, inner: SqlFragment, alias: &str) -> SqlFragment {
        let (sql, params) = inner.into_parts();
        let sql = match self.subquery_alias {
            SubqueryAlias::Required => format!("({sql}) AS {}", self.quote_identifier(alias)),
            SubqueryAlias::Prohibited => format!("({sql})"),
        };
        SqlFragment::new(sql, params)
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Builder for custom descriptors. Starts from the `generic` settings.
pub struct DialectBuilder {
    inner: DialectDescriptor,
}

impl DialectBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            inner: DialectDescriptor {
                name: name.into(),
                quote_open: '"',
                quote_close: '"',
                delimiter: ".".to_string(),
                skip_limit: SkipLimitSupport::None,
                skip_limit_style: SkipLimitStyle::LimitOffset,
                subquery_alias: SubqueryAlias::Required,
                null_ordering: NullOrdering::Post,
                supported_types: TypeFamily::ALL.into_iter().collect(),
                returning: false,
                renderer: Arc::new(DefaultRenderer),
            },
        }
    }

    pub fn quotes(mut self, open: char, close: char) -> Self {
        self.inner.quote_open = open;
        self.inner.quote_close = close;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.inner.delimiter = delimiter.into();
        self
    }

    pub fn skip_limit(mut self, support: SkipLimitSupport, style: SkipLimitStyle) -> Self {
        self.inner.skip_limit = support;
        self.inner.skip_limit_style = style;
        self
    }

    pub fn subquery_alias(mut self, policy: SubqueryAlias) -> Self {
        self.inner.subquery_alias = policy;
        self
    }

    pub fn null_ordering(mut self, ordering: NullOrdering) -> Self {
        self.inner.null_ordering = ordering;
        self
    }

    pub fn supported_types(mut self, families: impl IntoIterator<Item = TypeFamily>) -> Self {
        self.inner.supported_types = families.into_iter().collect();
        self
    }

    pub fn without_type(mut self, family: TypeFamily) -> Self {
        self.inner.supported_types.remove(&family);
        self
    }

    pub fn returning(mut self, supported: bool) -> Self {
        self.inner.returning = supported;
        self
    }

    pub fn renderer(mut self, renderer: impl PredicateRenderer + 'static) -> Self {
        self.inner.renderer = Arc::new(renderer);
        self
    }

    pub fn build(self) -> DialectDescriptor {
        debug!(
            dialect = %self.inner.name,
            renderer = self.inner.renderer.name(),
            "Built dialect descriptor"
        );
        self.inner
    }
}
