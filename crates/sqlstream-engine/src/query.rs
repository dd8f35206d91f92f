//! Query builder and terminals

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use sqlstream_ir::{CompiledQuery, FieldPredicate, SortKey};
use tracing::debug;

use crate::context::QueryContext;
use crate::error::Result;
use crate::mutation::{self, Delete, GeneratedKeys, Insert, Update};
use crate::optimizer::{plan, OptimizerConfig, QueryPlan};
use crate::pipeline::{Action, DedupFactory, Filter, Pipeline, Sort, Stage};
use crate::row::{FieldAccess, RowMapper};
use crate::source::ConnectionSource;
use crate::stream::RowSequence;

/// A lazily built pipeline over one relation. Intermediate operations only
/// record actions; a terminal plans, executes and consumes the query.
pub struct Query<T> {
    source: Arc<dyn ConnectionSource>,
    context: Arc<QueryContext>,
    mapper: Arc<dyn RowMapper<T>>,
    config: OptimizerConfig,
    pipeline: Pipeline<T>,
}

impl<T> Query<T>
where
    T: FieldAccess + Send + 'static,
{
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        context: Arc<QueryContext>,
        mapper: Arc<dyn RowMapper<T>>,
    ) -> Self {
        Self {
            source,
            context,
            mapper,
            config: OptimizerConfig::default(),
            pipeline: Pipeline::new(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    fn push(mut self, action: Action<T>) -> Self {
        self.pipeline.push(action);
        self
    }

    pub fn filter(self, predicate: FieldPredicate) -> Self {
        self.push(Action::Filter(Filter::Field(predicate)))
    }

    /// Filter with an arbitrary test. The whole pipeline is then evaluated
    /// in memory.
    pub fn filter_fn(self, test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.push(Action::Filter(Filter::Opaque(Arc::new(test))))
    }

    pub fn map(self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.push(Action::Map(Arc::new(f)))
    }

    pub fn sorted(self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.push(Action::Sorted(Sort::Fields(keys.into_iter().collect())))
    }

    pub fn sorted_by(self, cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        self.push(Action::Sorted(Sort::Comparator(Arc::new(cmp))))
    }

    pub fn skip(self, n: u64) -> Self {
        self.push(Action::Skip(n))
    }

    pub fn limit(self, n: u64) -> Self {
        self.push(Action::Limit(n))
    }

    pub fn peek(self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.push(Action::Peek(Arc::new(f)))
    }

    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        let factory: DedupFactory<T> = Arc::new(|| {
            let mut seen = HashSet::new();
            Box::new(move |row: &T| seen.insert(row.clone())) as Box<dyn FnMut(&T) -> bool + Send>
        });
        self.push(Action::Distinct(factory))
    }

    pub fn pipeline(&self) -> &Pipeline<T> {
        &self.pipeline
    }

    /// How the query would run, without touching the backend.
    pub fn explain(&self) -> Result<QueryPlan> {
        let stages = self.pipeline.stages();
        let plan = plan(stages, &self.context, &self.config)?;
        let names = |s: &[Stage<T>]| -> Vec<String> {
            s.iter().map(|s| s.action.name().to_string()).collect()
        };
        Ok(QueryPlan {
            statement: plan.statement,
            count_statement: plan.count_statement,
            pushed: names(&stages[..plan.pushed]),
            residual: names(&stages[plan.pushed..]),
            fallback_reason: plan.fallback.map(|r| r.to_string()),
        })
    }

    pub fn count(self) -> Result<u64> {
        let plan = plan(self.pipeline.stages(), &self.context, &self.config)?;
        if let Some(statement) = &plan.count_statement {
            debug!(sql = %statement.sql, "Counting in SQL");
            return Ok(self.source.query_count(statement)?);
        }

        let mut count = 0u64;
        for row in self.execute(plan.statement, plan.pushed)? {
            row?;
            count += 1;
        }
        Ok(count)
    }

    /// Open a row sequence; rows are fetched as it is traversed.
    pub fn stream(self) -> Result<RowSequence<T>> {
        let plan = plan(self.pipeline.stages(), &self.context, &self.config)?;
        self.execute(plan.statement, plan.pushed)
    }

    /// All rows, or the first error.
    pub fn collect(self) -> Result<Vec<T>> {
        self.stream()?.collect()
    }

    pub fn for_each(self, mut f: impl FnMut(T)) -> Result<()> {
        for row in self.stream()? {
            f(row?);
        }
        Ok(())
    }

    /// First row after the pipeline. A pushed pipeline fetches one row; a
    /// fallback pipeline reads whatever the source returns for the whole
    /// relation, which for a buffering source such as DuckDB means every
    /// row is loaded before the first is yielded.
    pub fn first(self) -> Result<Option<T>> {
        let mut rows = self.limit(1).stream()?;
        rows.next_row()
    }

    fn execute(self, statement: CompiledQuery, pushed: usize) -> Result<RowSequence<T>> {
        let cursor = self.source.query_rows(&statement)?;
        let residual = self.pipeline.into_residual(pushed);
        Ok(RowSequence::new(cursor, self.mapper, residual))
    }
}

/// Entry point for one relation: builds queries and runs mutations.
pub struct Table<T> {
    source: Arc<dyn ConnectionSource>,
    context: Arc<QueryContext>,
    mapper: Arc<dyn RowMapper<T>>,
    config: OptimizerConfig,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            context: Arc::clone(&self.context),
            mapper: Arc::clone(&self.mapper),
            config: self.config,
        }
    }
}

impl<T> Table<T>
where
    T: FieldAccess + Send + 'static,
{
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        context: QueryContext,
        mapper: impl RowMapper<T> + 'static,
    ) -> Self {
        Self {
            source,
            context: Arc::new(context),
            mapper: Arc::new(mapper),
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    pub fn query(&self) -> Query<T> {
        Query::new(
            Arc::clone(&self.source),
            Arc::clone(&self.context),
            Arc::clone(&self.mapper),
        )
        .with_config(self.config)
    }

    pub fn delete(&self, delete: &Delete) -> Result<u64> {
        mutation::execute(self.source.as_ref(), &self.context, delete, GeneratedKeys::new())
            .map(|(affected, _)| affected)
    }

    pub fn update(&self, update: &Update) -> Result<u64> {
        mutation::execute(self.source.as_ref(), &self.context, update, GeneratedKeys::new())
            .map(|(affected, _)| affected)
    }

    /// Insert one row, appending any generated key to `keys`.
    pub fn insert(&self, insert: &Insert, keys: GeneratedKeys) -> Result<(u64, GeneratedKeys)> {
        mutation::execute(self.source.as_ref(), &self.context, insert, keys)
    }
}
