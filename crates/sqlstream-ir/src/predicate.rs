//! Typed field predicates
//!
//! A [`FieldPredicate`] names one column, one closed [`PredicateOp`] and a
//! negation flag. It can be rendered to SQL by a dialect renderer or
//! evaluated in memory against a column value; both agree under SQL
//! three-valued logic.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::Value;

/// Uniquely names a column within an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(Cow<'static, str>);

impl FieldId {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// The operator whose result is the logical negation of this one.
    ///
    /// `NOT (x > 5)` and `x <= 5` are both UNKNOWN for a NULL `x`, so the
    /// flip is exact under three-valued logic.
    pub const fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    pub const fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        }
    }
}

/// Which ends of a `between` range are part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    Exclusive,
    StartInclusive,
    EndInclusive,
    Inclusive,
}

impl Inclusion {
    pub const fn lower_op(self) -> CompareOp {
        match self {
            Inclusion::StartInclusive | Inclusion::Inclusive => CompareOp::Ge,
            Inclusion::Exclusive | Inclusion::EndInclusive => CompareOp::Gt,
        }
    }

    pub const fn upper_op(self) -> CompareOp {
        match self {
            Inclusion::EndInclusive | Inclusion::Inclusive => CompareOp::Le,
            Inclusion::Exclusive | Inclusion::StartInclusive => CompareOp::Lt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    EqualIgnoreCase,
    StartsWith,
    StartsWithIgnoreCase,
    EndsWith,
    EndsWithIgnoreCase,
    Contains,
    ContainsIgnoreCase,
}

impl TextOp {
    pub const fn ignores_case(self) -> bool {
        matches!(
            self,
            TextOp::EqualIgnoreCase
                | TextOp::StartsWithIgnoreCase
                | TextOp::EndsWithIgnoreCase
                | TextOp::ContainsIgnoreCase
        )
    }

    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        let (haystack, needle): (Cow<'_, str>, Cow<'_, str>) = if self.ignores_case() {
            (haystack.to_lowercase().into(), needle.to_lowercase().into())
        } else {
            (haystack.into(), needle.into())
        };

        match self {
            TextOp::EqualIgnoreCase => haystack == needle,
            TextOp::StartsWith | TextOp::StartsWithIgnoreCase => haystack.starts_with(&*needle),
            TextOp::EndsWith | TextOp::EndsWithIgnoreCase => haystack.ends_with(&*needle),
            TextOp::Contains | TextOp::ContainsIgnoreCase => haystack.contains(&*needle),
        }
    }
}

/// The operation of a predicate together with its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PredicateOp {
    Constant { value: bool },
    IsNull,
    Compare { cmp: CompareOp, value: Value },
    Between { low: Value, high: Value, inclusion: Inclusion },
    In { values: Vec<Value> },
    Text { text_op: TextOp, value: String },
    IsEmpty,
}

/// Enumerated predicate kind, including negated counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    AlwaysTrue,
    AlwaysFalse,
    IsNull,
    IsNotNull,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    NotBetween,
    In,
    NotIn,
    EqualIgnoreCase,
    NotEqualIgnoreCase,
    StartsWith,
    NotStartsWith,
    StartsWithIgnoreCase,
    NotStartsWithIgnoreCase,
    EndsWith,
    NotEndsWith,
    EndsWithIgnoreCase,
    NotEndsWithIgnoreCase,
    Contains,
    NotContains,
    ContainsIgnoreCase,
    NotContainsIgnoreCase,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub field: FieldId,
    pub op: PredicateOp,
    #[serde(default)]
    pub negated: bool,
}

impl FieldPredicate {
    pub fn new(field: impl Into<FieldId>, op: PredicateOp) -> Self {
        Self {
            field: field.into(),
            op,
            negated: false,
        }
    }

    pub fn compare(field: impl Into<FieldId>, cmp: CompareOp, value: impl Into<Value>) -> Self {
        Self::new(
            field,
            PredicateOp::Compare {
                cmp,
                value: value.into(),
            },
        )
    }

    pub fn between(
        field: impl Into<FieldId>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        inclusion: Inclusion,
    ) -> Self {
        Self::new(
            field,
            PredicateOp::Between {
                low: low.into(),
                high: high.into(),
                inclusion,
            },
        )
    }

    /// Membership over a deduplicated set; `NULL` members never match and are
    /// dropped, and an empty set degenerates to always-false.
    pub fn in_set<V: Into<Value>>(
        field: impl Into<FieldId>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !value.is_null() && !members.contains(&value) {
                members.push(value);
            }
        }

        if members.is_empty() {
            Self::new(field, PredicateOp::Constant { value: false })
        } else {
            Self::new(field, PredicateOp::In { values: members })
        }
    }

    pub fn text(field: impl Into<FieldId>, text_op: TextOp, value: impl Into<String>) -> Self {
        Self::new(
            field,
            PredicateOp::Text {
                text_op,
                value: value.into(),
            },
        )
    }

    /// Logical negation. Comparisons and constants flip in place; every other
    /// op toggles the `negated` flag.
    pub fn negate(mut self) -> Self {
        match &mut self.op {
            PredicateOp::Compare { cmp, .. } => *cmp = cmp.negate(),
            PredicateOp::Constant { value } => *value = !*value,
            _ => self.negated = !self.negated,
        }
        self
    }

    pub fn kind(&self) -> PredicateKind {
        use PredicateKind as K;

        let (plain, negated) = match &self.op {
            PredicateOp::Constant { value: true } => (K::AlwaysTrue, K::AlwaysFalse),
            PredicateOp::Constant { value: false } => (K::AlwaysFalse, K::AlwaysTrue),
            PredicateOp::IsNull => (K::IsNull, K::IsNotNull),
            PredicateOp::Compare { cmp, .. } => {
                let kind = match cmp {
                    CompareOp::Eq => K::Equal,
                    CompareOp::Ne => K::NotEqual,
                    CompareOp::Gt => K::GreaterThan,
                    CompareOp::Ge => K::GreaterOrEqual,
                    CompareOp::Lt => K::LessThan,
                    CompareOp::Le => K::LessOrEqual,
                };
                (kind, kind)
            }
            PredicateOp::Between { .. } => (K::Between, K::NotBetween),
            PredicateOp::In { .. } => (K::In, K::NotIn),
            PredicateOp::Text { text_op, .. } => match text_op {
                TextOp::EqualIgnoreCase => (K::EqualIgnoreCase, K::NotEqualIgnoreCase),
                TextOp::StartsWith => (K::StartsWith, K::NotStartsWith),
                TextOp::StartsWithIgnoreCase => {
                    (K::StartsWithIgnoreCase, K::NotStartsWithIgnoreCase)
                }
                TextOp::EndsWith => (K::EndsWith, K::NotEndsWith),
                TextOp::EndsWithIgnoreCase => (K::EndsWithIgnoreCase, K::NotEndsWithIgnoreCase),
                TextOp::Contains => (K::Contains, K::NotContains),
                TextOp::ContainsIgnoreCase => (K::ContainsIgnoreCase, K::NotContainsIgnoreCase),
            },
            PredicateOp::IsEmpty => (K::IsEmpty, K::IsNotEmpty),
        };

        if self.negated {
            negated
        } else {
            plain
        }
    }

    /// Evaluate against one column value. `None` is SQL UNKNOWN; a filter
    /// keeps a row only on `Some(true)`.
    pub fn evaluate(&self, value: &Value) -> Option<bool> {
        let result = match &self.op {
            PredicateOp::Constant { value: constant } => Some(*constant),
            PredicateOp::IsNull => Some(value.is_null()),
            PredicateOp::Compare { cmp, value: operand } => {
                value.sql_cmp(operand).map(|ord| cmp.matches(ord))
            }
            PredicateOp::Between { low, high, inclusion } => and3(
                value.sql_cmp(low).map(|ord| inclusion.lower_op().matches(ord)),
                value.sql_cmp(high).map(|ord| inclusion.upper_op().matches(ord)),
            ),
            PredicateOp::In { values } if values.is_empty() => Some(false),
            PredicateOp::In { values } => {
                if value.is_null() {
                    None
                } else {
                    let mut result = Some(false);
                    for member in values {
                        match value.sql_eq(member) {
                            Some(true) => return self.apply_negation(Some(true)),
                            Some(false) => {}
                            None => result = None,
                        }
                    }
                    result
                }
            }
            PredicateOp::Text { text_op, value: needle } => {
                value.as_text().map(|s| text_op.matches(s, needle))
            }
            PredicateOp::IsEmpty => value.as_text().map(str::is_empty),
        };

        self.apply_negation(result)
    }

    fn apply_negation(&self, result: Option<bool>) -> Option<bool> {
        if self.negated {
            result.map(|b| !b)
        } else {
            result
        }
    }
}

/// Three-valued AND.
fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// A typed handle on one entity column.
///
/// The type parameter restricts operands at compile time; text operators are
/// only available on `Field<String>`.
pub struct Field<V> {
    id: FieldId,
    _value: PhantomData<fn() -> V>,
}

impl<V> Field<V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            id: FieldId::from_static(name),
            _value: PhantomData,
        }
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn is_null(&self) -> FieldPredicate {
        FieldPredicate::new(self.id.clone(), PredicateOp::IsNull)
    }

    pub fn is_not_null(&self) -> FieldPredicate {
        self.is_null().negate()
    }
}

impl<V> Clone for Field<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for Field<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.id).finish()
    }
}

impl<V: Into<Value>> Field<V> {
    pub fn equal(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Eq, value)
    }

    pub fn not_equal(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Ne, value)
    }

    pub fn greater_than(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Gt, value)
    }

    pub fn greater_or_equal(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Ge, value)
    }

    pub fn less_than(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Lt, value)
    }

    pub fn less_or_equal(&self, value: V) -> FieldPredicate {
        FieldPredicate::compare(self.id.clone(), CompareOp::Le, value)
    }

    /// Start inclusive, end exclusive.
    pub fn between(&self, low: V, high: V) -> FieldPredicate {
        self.between_with(low, high, Inclusion::StartInclusive)
    }

    pub fn between_with(&self, low: V, high: V, inclusion: Inclusion) -> FieldPredicate {
        FieldPredicate::between(self.id.clone(), low, high, inclusion)
    }

    pub fn not_between(&self, low: V, high: V) -> FieldPredicate {
        self.between(low, high).negate()
    }

    pub fn in_set(&self, values: impl IntoIterator<Item = V>) -> FieldPredicate {
        FieldPredicate::in_set(self.id.clone(), values)
    }

    pub fn not_in(&self, values: impl IntoIterator<Item = V>) -> FieldPredicate {
        self.in_set(values).negate()
    }
}

impl Field<String> {
    fn text(&self, text_op: TextOp, value: &str) -> FieldPredicate {
        FieldPredicate::text(self.id.clone(), text_op, value)
    }

    pub fn equal_ignore_case(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::EqualIgnoreCase, value)
    }

    pub fn starts_with(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::StartsWith, value)
    }

    pub fn starts_with_ignore_case(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::StartsWithIgnoreCase, value)
    }

    pub fn ends_with(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::EndsWith, value)
    }

    pub fn ends_with_ignore_case(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::EndsWithIgnoreCase, value)
    }

    pub fn contains(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::Contains, value)
    }

    pub fn contains_ignore_case(&self, value: &str) -> FieldPredicate {
        self.text(TextOp::ContainsIgnoreCase, value)
    }

    pub fn is_empty(&self) -> FieldPredicate {
        FieldPredicate::new(self.id.clone(), PredicateOp::IsEmpty)
    }

    pub fn is_not_empty(&self) -> FieldPredicate {
        self.is_empty().negate()
    }
}
