//! Field-keyed sort specifications

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{Field, FieldId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullsOrder {
    First,
    Last,
}

/// One `ORDER BY` key. Null placement is explicit and independent of the
/// direction, so the same key sorts identically in memory and in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: FieldId,
    #[serde(default)]
    pub descending: bool,
    pub nulls: NullsOrder,
}

impl SortKey {
    /// Ascending, nulls last.
    pub fn asc(field: impl Into<FieldId>) -> Self {
        Self {
            field: field.into(),
            descending: false,
            nulls: NullsOrder::Last,
        }
    }

    /// Descending, nulls first.
    pub fn desc(field: impl Into<FieldId>) -> Self {
        Self {
            field: field.into(),
            descending: true,
            nulls: NullsOrder::First,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullsOrder::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullsOrder::Last;
        self
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match self.nulls {
                NullsOrder::First => Ordering::Less,
                NullsOrder::Last => Ordering::Greater,
            },
            (false, true) => match self.nulls {
                NullsOrder::First => Ordering::Greater,
                NullsOrder::Last => Ordering::Less,
            },
            (false, false) => {
                let ord = a.sql_cmp(b).unwrap_or(Ordering::Equal);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }
}

impl<V> Field<V> {
    pub fn asc(&self) -> SortKey {
        SortKey::asc(self.id().clone())
    }

    pub fn desc(&self) -> SortKey {
        SortKey::desc(self.id().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_placement_ignores_direction() {
        let key = SortKey::desc("age").nulls_last();
        assert_eq!(key.compare(&Value::Null, &Value::Int(1)), Ordering::Greater);
        assert_eq!(key.compare(&Value::Int(2), &Value::Int(1)), Ordering::Less);

        let key = SortKey::asc("age").nulls_first();
        assert_eq!(key.compare(&Value::Null, &Value::Int(1)), Ordering::Less);
        assert_eq!(key.compare(&Value::Int(2), &Value::Int(1)), Ordering::Greater);
    }
}
