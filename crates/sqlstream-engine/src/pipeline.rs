//! Pipeline actions
//!
//! A [`Pipeline`] is the ordered list of intermediate operations recorded by
//! a [`Query`](crate::Query). Each stage carries [`ActionTraits`] computed
//! when it is pushed, which the planner uses to decide what a terminal may
//! skip.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use sqlstream_ir::{FieldPredicate, SortKey};

pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub type Mapper<T> = Arc<dyn Fn(T) -> T + Send + Sync>;
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;
pub type Inspector<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Produces a fresh "first time seen" test for one traversal.
pub type DedupFactory<T> = Arc<dyn Fn() -> Box<dyn FnMut(&T) -> bool + Send> + Send + Sync>;

pub enum Filter<T> {
    Field(FieldPredicate),
    Opaque(Predicate<T>),
}

pub enum Sort<T> {
    Fields(Vec<SortKey>),
    Comparator(Comparator<T>),
}

pub enum Action<T> {
    Filter(Filter<T>),
    Map(Mapper<T>),
    Sorted(Sort<T>),
    Distinct(DedupFactory<T>),
    Skip(u64),
    Limit(u64),
    Peek(Inspector<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTraits {
    /// Output row count equals input row count
    pub preserves_count: bool,
    /// Output rows are the input rows, unchanged
    pub preserves_identity: bool,
}

impl<T> Action<T> {
    pub fn traits(&self) -> ActionTraits {
        let (preserves_count, preserves_identity) = match self {
            Action::Filter(_) => (false, true),
            Action::Map(_) => (true, false),
            Action::Sorted(_) => (true, true),
            Action::Distinct(_) => (false, true),
            Action::Skip(_) | Action::Limit(_) => (false, true),
            Action::Peek(_) => (true, true),
        };
        ActionTraits {
            preserves_count,
            preserves_identity,
        }
    }

    /// Whether the action looks at one row at a time, so it can run
    /// independently on each segment of a partitioned sequence.
    pub fn is_row_local(&self) -> bool {
        matches!(self, Action::Filter(_) | Action::Map(_) | Action::Peek(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Filter(Filter::Field(_)) => "filter",
            Action::Filter(Filter::Opaque(_)) => "filter_fn",
            Action::Map(_) => "map",
            Action::Sorted(Sort::Fields(_)) => "sorted",
            Action::Sorted(Sort::Comparator(_)) => "sorted_by",
            Action::Distinct(_) => "distinct",
            Action::Skip(_) => "skip",
            Action::Limit(_) => "limit",
            Action::Peek(_) => "peek",
        }
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        match self {
            Filter::Field(p) => Filter::Field(p.clone()),
            Filter::Opaque(f) => Filter::Opaque(Arc::clone(f)),
        }
    }
}

impl<T> Clone for Sort<T> {
    fn clone(&self) -> Self {
        match self {
            Sort::Fields(keys) => Sort::Fields(keys.clone()),
            Sort::Comparator(f) => Sort::Comparator(Arc::clone(f)),
        }
    }
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        match self {
            Action::Filter(f) => Action::Filter(f.clone()),
            Action::Map(f) => Action::Map(Arc::clone(f)),
            Action::Sorted(s) => Action::Sorted(s.clone()),
            Action::Distinct(f) => Action::Distinct(Arc::clone(f)),
            Action::Skip(n) => Action::Skip(*n),
            Action::Limit(n) => Action::Limit(*n),
            Action::Peek(f) => Action::Peek(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Filter(Filter::Field(p)) => f.debug_tuple("Filter").field(p).finish(),
            Action::Sorted(Sort::Fields(keys)) => f.debug_tuple("Sorted").field(keys).finish(),
            Action::Skip(n) => f.debug_tuple("Skip").field(n).finish(),
            Action::Limit(n) => f.debug_tuple("Limit").field(n).finish(),
            other => f.write_str(other.name()),
        }
    }
}

pub struct Stage<T> {
    pub action: Action<T>,
    pub traits: ActionTraits,
}

impl<T> Clone for Stage<T> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            traits: self.traits,
        }
    }
}

impl<T> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.action.fmt(f)
    }
}

pub struct Pipeline<T> {
    stages: Vec<Stage<T>>,
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.stages).finish()
    }
}

impl<T> Pipeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action<T>) {
        let traits = action.traits();
        self.stages.push(Stage { action, traits });
    }

    pub fn stages(&self) -> &[Stage<T>] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages from `index` on, consuming the pipeline.
    pub fn into_residual(self, index: usize) -> Vec<Stage<T>> {
        let mut stages = self.stages;
        stages.split_off(index.min(stages.len()))
    }
}
