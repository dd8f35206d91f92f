//! In-memory evaluation of residual actions
//!
//! Residual stages are chained as lazy iterator adapters over
//! `Result<T, QueryError>` items. Errors pass through every adapter
//! untouched and are never counted by skip/limit.

use std::cmp::Ordering;
use std::sync::Arc;
use std::vec;

use sqlstream_ir::{SortKey, Value};

use crate::error::QueryError;
use crate::pipeline::{Action, Comparator, Filter, Sort, Stage};
use crate::row::FieldAccess;

pub type Rows<T> = Box<dyn Iterator<Item = Result<T, QueryError>> + Send>;

/// Chain `stages` over `rows`, in order.
pub fn replay<T>(rows: Rows<T>, stages: Vec<Stage<T>>) -> Rows<T>
where
    T: FieldAccess + Send + 'static,
{
    stages
        .into_iter()
        .fold(rows, |rows, stage| apply(rows, stage.action))
}

fn apply<T>(rows: Rows<T>, action: Action<T>) -> Rows<T>
where
    T: FieldAccess + Send + 'static,
{
    match action {
        Action::Filter(Filter::Field(predicate)) => Box::new(rows.filter(move |row| match row {
            // only a definite TRUE keeps the row
            Ok(row) => predicate.evaluate(&row.field_value(&predicate.field)) == Some(true),
            Err(_) => true,
        })),
        Action::Filter(Filter::Opaque(test)) => Box::new(rows.filter(move |row| match row {
            Ok(row) => test(row),
            Err(_) => true,
        })),
        Action::Map(f) => Box::new(rows.map(move |row| row.map(|r| f(r)))),
        Action::Sorted(Sort::Fields(keys)) => {
            let cmp: Comparator<T> = Arc::new(move |a: &T, b: &T| compare_keys(&keys, a, b));
            Box::new(SortedRows::new(rows, cmp))
        }
        Action::Sorted(Sort::Comparator(cmp)) => Box::new(SortedRows::new(rows, cmp)),
        Action::Distinct(factory) => {
            let mut first_seen = factory();
            Box::new(rows.filter(move |row| match row {
                Ok(row) => first_seen(row),
                Err(_) => true,
            }))
        }
        Action::Skip(n) => {
            let mut remaining = n;
            Box::new(rows.filter(move |row| match row {
                Ok(_) if remaining > 0 => {
                    remaining -= 1;
                    false
                }
                _ => true,
            }))
        }
        Action::Limit(n) => Box::new(Limited { rows, left: n }),
        Action::Peek(inspect) => Box::new(rows.inspect(move |row| {
            if let Ok(row) = row {
                inspect(row);
            }
        })),
    }
}

fn compare_keys<T: FieldAccess>(keys: &[SortKey], a: &T, b: &T) -> Ordering {
    keys.iter()
        .map(|key| {
            let (va, vb): (Value, Value) = (a.field_value(&key.field), b.field_value(&key.field));
            key.compare(&va, &vb)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Stops pulling from upstream once `left` rows were delivered.
struct Limited<T> {
    rows: Rows<T>,
    left: u64,
}

impl<T> Iterator for Limited<T> {
    type Item = Result<T, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        let item = self.rows.next()?;
        if item.is_ok() {
            self.left -= 1;
        }
        Some(item)
    }
}

/// Drains upstream on first pull, then yields in stable sorted order. An
/// upstream error is delivered instead of any rows.
struct SortedRows<T> {
    upstream: Option<Rows<T>>,
    cmp: Comparator<T>,
    sorted: vec::IntoIter<T>,
}

impl<T> SortedRows<T> {
    fn new(upstream: Rows<T>, cmp: Comparator<T>) -> Self {
        Self {
            upstream: Some(upstream),
            cmp,
            sorted: Vec::new().into_iter(),
        }
    }
}

impl<T> Iterator for SortedRows<T> {
    type Item = Result<T, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(upstream) = self.upstream.take() {
            let mut buffer = match upstream.collect::<Result<Vec<T>, QueryError>>() {
                Ok(buffer) => buffer,
                Err(e) => return Some(Err(e)),
            };
            buffer.sort_by(|a, b| (self.cmp)(a, b));
            self.sorted = buffer.into_iter();
        }
        self.sorted.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use super::*;
    use crate::pipeline::Pipeline;
    use sqlstream_ir::{Field, FieldId};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Person {
        name: &'static str,
        age: Option<i64>,
    }

    impl FieldAccess for Person {
        fn field_value(&self, field: &FieldId) -> Value {
            match field.as_str() {
                "name" => Value::from(self.name),
                "age" => Value::from(self.age),
                _ => Value::Null,
            }
        }
    }

    const AGE: Field<i64> = Field::new("age");

    fn people() -> Vec<Person> {
        vec![
            Person { name: "ann", age: Some(30) },
            Person { name: "bob", age: None },
            Person { name: "cy", age: Some(17) },
            Person { name: "di", age: Some(30) },
        ]
    }

    fn source(items: Vec<Person>) -> Rows<Person> {
        Box::new(items.into_iter().map(Ok))
    }

    fn run(actions: Vec<Action<Person>>) -> Vec<Person> {
        let mut pipeline = Pipeline::new();
        for action in actions {
            pipeline.push(action);
        }
        replay(source(people()), pipeline.into_residual(0))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_null_column_never_matches() {
        let out = run(vec![Action::Filter(Filter::Field(AGE.not_equal(30)))]);
        assert_eq!(out.iter().map(|p| p.name).collect::<Vec<_>>(), vec!["cy"]);
    }

    #[test]
    fn test_sort_is_stable_with_null_placement() {
        let out = run(vec![Action::Sorted(Sort::Fields(vec![AGE.desc()]))]);
        assert_eq!(
            out.iter().map(|p| p.name).collect::<Vec<_>>(),
            vec!["bob", "ann", "di", "cy"]
        );
    }

    #[test]
    fn test_skip_then_limit() {
        let out = run(vec![Action::Skip(1), Action::Limit(2)]);
        assert_eq!(out.iter().map(|p| p.name).collect::<Vec<_>>(), vec!["bob", "cy"]);
    }

    #[test]
    fn test_limit_stops_pulling() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let rows: Rows<Person> = Box::new(people().into_iter().map(move |p| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(p)
        }));
        let mut pipeline = Pipeline::new();
        pipeline.push(Action::Limit(1));
        let out: Vec<_> = replay(rows, pipeline.into_residual(0)).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(pulled.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_uses_fresh_state() {
        let factory: crate::pipeline::DedupFactory<Person> = Arc::new(|| {
            let mut seen = HashSet::new();
            Box::new(move |p: &Person| seen.insert(p.age)) as Box<dyn FnMut(&Person) -> bool + Send>
        });
        let out = run(vec![Action::Distinct(factory)]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_error_passes_through() {
        let rows: Rows<Person> = Box::new(
            vec![Ok(people()[0].clone()), Err(QueryError::ResourceClosed)].into_iter(),
        );
        let mut pipeline = Pipeline::new();
        pipeline.push(Action::Sorted(Sort::Fields(vec![AGE.asc()])));
        let out: Vec<_> = replay(rows, pipeline.into_residual(0)).collect();
        assert!(matches!(out.as_slice(), [Err(QueryError::ResourceClosed)]));
    }
}
