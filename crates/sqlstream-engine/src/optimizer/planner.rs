use sqlstream_dialect::{ColumnRef, RenderError, SkipLimitSupport};
use sqlstream_ir::{CompiledQuery, SortKey, SqlFragment};
use tracing::debug;

use super::{FallbackReason, OptimizerConfig};
use crate::context::QueryContext;
use crate::pipeline::{Action, Filter, Sort, Stage};

const COUNT_ALIAS: &str = "sqlstream_window";

/// A folded run of consecutive skip/limit actions. `limit == u64::MAX`
/// means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: u64::MAX,
        }
    }
}

impl Window {
    pub fn skip(&mut self, n: u64) {
        self.skip = self.skip.saturating_add(n);
        if self.limit != u64::MAX {
            self.limit = self.limit.saturating_sub(n);
        }
    }

    pub fn limit(&mut self, n: u64) {
        self.limit = self.limit.min(n);
    }

    pub fn is_unbounded(&self) -> bool {
        self.skip == 0 && self.limit == u64::MAX
    }
}

/// Outcome of planning one terminal call.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Statement fetching the rows the residual actions consume
    pub statement: CompiledQuery,
    /// Single-statement count, when every residual action preserves count
    pub count_statement: Option<CompiledQuery>,
    /// Number of leading actions absorbed into `statement`
    pub pushed: usize,
    pub fallback: Option<FallbackReason>,
}

/// All-or-nothing eligibility: `None` when the pipeline may be pushed down.
pub fn can_push_down<T>(
    stages: &[Stage<T>],
    ctx: &QueryContext,
    config: &OptimizerConfig,
) -> Option<FallbackReason> {
    if !config.enable_pushdown {
        return Some(FallbackReason::Disabled);
    }

    for (position, stage) in stages.iter().enumerate() {
        match &stage.action {
            Action::Filter(Filter::Opaque(_)) => {
                return Some(FallbackReason::OpaqueFilter { position });
            }
            Action::Filter(Filter::Field(predicate)) => {
                let Some(declared) = ctx.declared_type(&predicate.field) else {
                    return Some(FallbackReason::UnknownField(predicate.field.clone()));
                };
                if ctx.column_sql(&predicate.field).is_none() {
                    return Some(FallbackReason::UnknownField(predicate.field.clone()));
                }
                if !ctx.dialect().supports(declared) {
                    return Some(FallbackReason::UnsupportedType {
                        field: predicate.field.clone(),
                        declared: declared.clone(),
                    });
                }
            }
            Action::Skip(_) | Action::Limit(_)
                if ctx.dialect().skip_limit_support() == SkipLimitSupport::None =>
            {
                return Some(FallbackReason::SkipLimitUnsupported { position });
            }
            _ => {}
        }
    }
    None
}

/// Plan a pipeline: absorb the longest SQL-expressible prefix and compile
/// the row and count statements.
pub fn plan<T>(
    stages: &[Stage<T>],
    ctx: &QueryContext,
    config: &OptimizerConfig,
) -> Result<Plan, RenderError> {
    if let Some(reason) = can_push_down(stages, ctx, config) {
        return Ok(fallback(ctx, reason));
    }

    let dialect = ctx.dialect();
    let mut filters = Vec::new();
    let mut order_by: Option<String> = None;
    let mut window: Option<Window> = None;
    let mut pushed = 0;

    for (position, stage) in stages.iter().enumerate() {
        let absorbed = match &stage.action {
            // WHERE applies before the window, so only filters preceding it
            Action::Filter(Filter::Field(predicate)) if window.is_none() => {
                match (
                    ctx.column_sql(&predicate.field),
                    ctx.declared_type(&predicate.field),
                ) {
                    (Some(column), Some(declared)) => {
                        let fragment = dialect.render_predicate(
                            predicate,
                            ColumnRef {
                                sql: &column,
                                declared,
                            },
                        )?;
                        filters.push(fragment);
                        true
                    }
                    _ => false,
                }
            }
            Action::Sorted(Sort::Fields(keys)) if order_by.is_none() && window.is_none() => {
                if keys.is_empty() {
                    true
                } else {
                    match order_clause(ctx, keys) {
                        Some(clause) => {
                            order_by = Some(clause);
                            true
                        }
                        None => false,
                    }
                }
            }
            Action::Skip(_) | Action::Limit(_)
                if window.is_none() && !dialect.can_apply_skip_limit(order_by.is_some()) =>
            {
                return Ok(fallback(
                    ctx,
                    FallbackReason::SkipLimitUnsupported { position },
                ));
            }
            Action::Skip(n) => {
                window.get_or_insert_with(Window::default).skip(*n);
                true
            }
            Action::Limit(n) => {
                window.get_or_insert_with(Window::default).limit(*n);
                true
            }
            _ => false,
        };
        if !absorbed {
            break;
        }
        pushed += 1;
    }

    // FETCH NEXT 0 ROWS is invalid SQL, so an empty window becomes a false filter
    if window.is_some_and(|w| w.limit == 0) {
        filters.push(SqlFragment::raw("(1 = 0)"));
        window = None;
    }

    let (where_sql, where_params) = SqlFragment::and_all(filters)
        .map(SqlFragment::into_parts)
        .unwrap_or_default();
    let where_clause = if where_sql.is_empty() {
        String::new()
    } else {
        format!(" WHERE {where_sql}")
    };

    let select = SqlFragment::new(
        format!(
            "SELECT * FROM {}{}{}",
            ctx.relation(),
            where_clause,
            order_by.as_deref().unwrap_or_default()
        ),
        where_params.clone(),
    );
    let window = window.filter(|w| !w.is_unbounded());
    let select = match window {
        Some(w) => dialect.apply_skip_limit(select, w.skip, w.limit),
        None => select,
    };

    let residual_preserves_count = stages[pushed..].iter().all(|s| s.traits.preserves_count);
    let count_statement = residual_preserves_count.then(|| match window {
        Some(_) => {
            let (sql, params) = dialect.derived_table(select.clone(), COUNT_ALIAS).into_parts();
            CompiledQuery::new(format!("SELECT COUNT(*) FROM {sql}"), params)
        }
        None => CompiledQuery::new(
            format!("SELECT COUNT(*) FROM {}{}", ctx.relation(), where_clause),
            where_params,
        ),
    });

    let statement = CompiledQuery::from(select);
    debug!(
        dialect = dialect.name(),
        sql = %statement.sql,
        params = ?statement.params,
        pushed,
        residual = stages.len() - pushed,
        count_pushdown = count_statement.is_some(),
        "Pushdown plan"
    );

    Ok(Plan {
        statement,
        count_statement,
        pushed,
        fallback: None,
    })
}

fn fallback(ctx: &QueryContext, reason: FallbackReason) -> Plan {
    let statement = CompiledQuery::new(format!("SELECT * FROM {}", ctx.relation()), vec![]);
    debug!(
        dialect = ctx.dialect().name(),
        sql = %statement.sql,
        reason = %reason,
        "Pipeline evaluated in memory"
    );
    Plan {
        statement,
        count_statement: None,
        pushed: 0,
        fallback: Some(reason),
    }
}

fn order_clause(ctx: &QueryContext, keys: &[SortKey]) -> Option<String> {
    let columns = keys
        .iter()
        .map(|key| ctx.column_sql(&key.field))
        .collect::<Option<Vec<_>>>()?;
    Some(
        ctx.dialect()
            .order_by(columns.iter().map(String::as_str).zip(keys)),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::Pipeline;
    use sqlstream_dialect::{presets, DialectDescriptor};
    use sqlstream_ir::{DeclaredType, Field, TableSchema, Value};

    const AGE: Field<i64> = Field::new("age");
    const NAME: Field<String> = Field::new("name");
    const ACTIVE: Field<bool> = Field::new("active");

    fn ctx(dialect: DialectDescriptor) -> QueryContext {
        let table = TableSchema::new("t")
            .column("age", DeclaredType::Integer)
            .column("name", DeclaredType::Varchar(None))
            .column("active", DeclaredType::Boolean);
        QueryContext::for_table(table, Arc::new(dialect))
    }

    fn filter(p: sqlstream_ir::FieldPredicate) -> Action<i64> {
        Action::Filter(Filter::Field(p))
    }

    fn pipeline(actions: Vec<Action<i64>>) -> Pipeline<i64> {
        let mut pipeline = Pipeline::new();
        for action in actions {
            pipeline.push(action);
        }
        pipeline
    }

    fn run(actions: Vec<Action<i64>>, dialect: DialectDescriptor) -> Plan {
        let p = pipeline(actions);
        plan(p.stages(), &ctx(dialect), &OptimizerConfig::default()).unwrap()
    }

    #[test]
    fn test_count_scenario() {
        let plan = run(
            vec![filter(AGE.greater_than(18)), filter(AGE.less_than(65))],
            presets::duckdb(),
        );
        let count = plan.count_statement.unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) FROM \"t\" WHERE (\"age\" > ?) AND (\"age\" < ?)"
        );
        assert_eq!(count.params, vec![Value::Int(18), Value::Int(65)]);
        assert_eq!(plan.pushed, 2);
    }

    #[test]
    fn test_filter_then_sort_counts_in_sql() {
        let plan = run(
            vec![
                filter(NAME.equal("bob".to_string())),
                Action::Sorted(Sort::Fields(vec![AGE.asc()])),
            ],
            presets::duckdb(),
        );
        assert_eq!(
            plan.statement.sql,
            "SELECT * FROM \"t\" WHERE (\"name\" = ?) ORDER BY \"age\" ASC NULLS LAST"
        );
        assert_eq!(
            plan.count_statement.unwrap().sql,
            "SELECT COUNT(*) FROM \"t\" WHERE (\"name\" = ?)"
        );
    }

    #[test]
    fn test_opaque_filter_falls_back() {
        let plan = run(
            vec![
                filter(AGE.greater_than(1)),
                Action::Filter(Filter::Opaque(Arc::new(|x: &i64| *x > 0))),
            ],
            presets::duckdb(),
        );
        assert_eq!(plan.fallback, Some(FallbackReason::OpaqueFilter { position: 1 }));
        assert_eq!(plan.statement.sql, "SELECT * FROM \"t\"");
        assert!(plan.statement.params.is_empty());
        assert!(plan.count_statement.is_none());
        assert_eq!(plan.pushed, 0);
    }

    #[test]
    fn test_disabled_falls_back() {
        let p = pipeline(vec![filter(AGE.greater_than(1))]);
        let plan = plan(p.stages(), &ctx(presets::duckdb()), &OptimizerConfig::disabled()).unwrap();
        assert_eq!(plan.fallback, Some(FallbackReason::Disabled));
    }

    #[test]
    fn test_unknown_field_falls_back() {
        let plan = run(
            vec![filter(Field::<i64>::new("height").equal(3))],
            presets::duckdb(),
        );
        assert_eq!(
            plan.fallback,
            Some(FallbackReason::UnknownField("height".into()))
        );
    }

    #[test]
    fn test_unsupported_type_falls_back() {
        let plan = run(vec![filter(ACTIVE.equal(true))], presets::oracle());
        assert!(matches!(
            plan.fallback,
            Some(FallbackReason::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_window_folding() {
        let plan = run(
            vec![Action::Skip(2), Action::Limit(10), Action::Skip(3), Action::Limit(20)],
            presets::duckdb(),
        );
        assert_eq!(plan.pushed, 4);
        assert_eq!(plan.statement.sql, "SELECT * FROM \"t\" LIMIT ? OFFSET ?");
        assert_eq!(plan.statement.params, vec![Value::Int(7), Value::Int(5)]);
        assert_eq!(
            plan.count_statement.unwrap().sql,
            "SELECT COUNT(*) FROM (SELECT * FROM \"t\" LIMIT ? OFFSET ?) AS \"sqlstream_window\""
        );
    }

    #[test]
    fn test_filter_after_window_stays_in_memory() {
        let plan = run(
            vec![Action::Limit(5), filter(AGE.greater_than(1))],
            presets::duckdb(),
        );
        assert_eq!(plan.pushed, 1);
        assert_eq!(plan.statement.sql, "SELECT * FROM \"t\" LIMIT ?");
        assert!(plan.count_statement.is_none());
    }

    #[test]
    fn test_skip_limit_dialect_boundary() {
        // no support at all
        let plan = run(
            vec![filter(AGE.greater_than(1)), Action::Limit(5)],
            presets::generic(),
        );
        assert_eq!(
            plan.fallback,
            Some(FallbackReason::SkipLimitUnsupported { position: 1 })
        );
        assert_eq!(plan.pushed, 0);
        assert_eq!(plan.statement.sql, "SELECT * FROM \"t\"");

        // only after a pushed sort
        let plan = run(vec![Action::Limit(5)], presets::sqlserver());
        assert_eq!(
            plan.fallback,
            Some(FallbackReason::SkipLimitUnsupported { position: 0 })
        );

        // behind a map the limit still forces the fallback
        let plan = run(
            vec![
                filter(AGE.greater_than(1)),
                Action::Map(Arc::new(|x: i64| x)),
                Action::Limit(5),
            ],
            presets::generic(),
        );
        assert_eq!(
            plan.fallback,
            Some(FallbackReason::SkipLimitUnsupported { position: 2 })
        );
        assert_eq!(plan.pushed, 0);

        // a sort dialect only checks the prefix, so a filter ahead of a map is pushed
        let plan = run(
            vec![
                filter(AGE.greater_than(1)),
                Action::Map(Arc::new(|x: i64| x)),
                Action::Limit(5),
            ],
            presets::sqlserver(),
        );
        assert!(plan.fallback.is_none());
        assert_eq!(plan.pushed, 1);

        let plan = run(
            vec![Action::Sorted(Sort::Fields(vec![AGE.asc()])), Action::Limit(5)],
            presets::sqlserver(),
        );
        assert_eq!(plan.pushed, 2);
        assert_eq!(
            plan.statement.sql,
            "SELECT * FROM [t] ORDER BY CASE WHEN [age] IS NULL THEN 1 ELSE 0 END ASC, [age] ASC \
             OFFSET ? ROWS FETCH NEXT ? ROWS ONLY"
        );
    }

    #[test]
    fn test_map_ends_prefix() {
        let plan = run(
            vec![
                Action::Map(Arc::new(|x: i64| x * 2)),
                filter(AGE.greater_than(1)),
            ],
            presets::duckdb(),
        );
        assert_eq!(plan.pushed, 0);
        assert!(plan.fallback.is_none());
        assert!(plan.count_statement.is_none());
    }

    #[test]
    fn test_oracle_count_over_unaliased_window() {
        let plan = run(
            vec![filter(AGE.greater_than(1)), Action::Limit(3)],
            presets::oracle(),
        );
        assert_eq!(
            plan.count_statement.unwrap().sql,
            "SELECT COUNT(*) FROM (SELECT * FROM \"t\" WHERE (\"age\" > ?) OFFSET ? ROWS FETCH NEXT ? ROWS ONLY)"
        );
    }

    #[test]
    fn test_empty_window_is_false_filter() {
        let plan = run(
            vec![
                Action::Sorted(Sort::Fields(vec![AGE.asc()])),
                Action::Skip(3),
                Action::Limit(0),
            ],
            presets::sqlserver(),
        );
        assert_eq!(plan.pushed, 3);
        assert_eq!(
            plan.statement.sql,
            "SELECT * FROM [t] WHERE (1 = 0) ORDER BY CASE WHEN [age] IS NULL THEN 1 ELSE 0 END ASC, [age] ASC"
        );
        assert!(plan.statement.params.is_empty());
        assert_eq!(
            plan.count_statement.unwrap().sql,
            "SELECT COUNT(*) FROM [t] WHERE (1 = 0)"
        );

        let plan = run(
            vec![filter(AGE.greater_than(1)), Action::Limit(5), Action::Limit(0)],
            presets::duckdb(),
        );
        assert_eq!(plan.statement.sql, "SELECT * FROM \"t\" WHERE (\"age\" > ?) AND (1 = 0)");
        assert_eq!(plan.statement.params, vec![Value::Int(1)]);
    }
}
