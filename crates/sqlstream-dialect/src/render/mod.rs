//! Predicate rendering
//!
//! [`render_predicate`] turns one [`FieldPredicate`] into a parenthesized
//! boolean [`SqlFragment`]. Ordering predicates split on the column's
//! declared type: textual columns go through the `text_*` methods of
//! [`PredicateRenderer`], which dialects override to control collation and
//! case folding; everything else takes the generic path.

mod mysql;
mod postgres;

use std::fmt;

use sqlstream_ir::{
    CompareOp, DeclaredType, FieldPredicate, PredicateKind, PredicateOp, SqlFragment, TextOp,
    Value,
};
use thiserror::Error;

pub use mysql::MySqlRenderer;
pub use postgres::PostgresRenderer;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("Unsupported predicate {kind:?} on column {column} of type {declared}")]
    UnsupportedPredicate {
        kind: PredicateKind,
        column: String,
        declared: DeclaredType,
    },
}

/// A resolved column as it appears in SQL.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRef<'a> {
    /// Quoted column expression
    pub sql: &'a str,
    pub declared: &'a DeclaredType,
}

/// Dialect override points for predicate rendering.
///
/// Every method returns an unparenthesized expression; the dispatcher adds
/// the outer parentheses and negation. The defaults compare text
/// case-sensitively and fold case with `LOWER`.
pub trait PredicateRenderer: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn render(
        &self,
        predicate: &FieldPredicate,
        column: ColumnRef<'_>,
    ) -> Result<SqlFragment, RenderError> {
        render_predicate(self, predicate, column)
    }

    fn compare(&self, column: &str, cmp: CompareOp, operand: &Value) -> SqlFragment {
        SqlFragment::new(format!("{column} {} ?", cmp.sql()), vec![operand.clone()])
    }

    fn in_list(&self, column: &str, members: &[Value]) -> SqlFragment {
        SqlFragment::new(
            format!("{column} IN ({})", placeholders(members.len())),
            members.to_vec(),
        )
    }

    fn text_compare(&self, column: &str, cmp: CompareOp, operand: &Value) -> SqlFragment {
        self.compare(column, cmp, operand)
    }

    fn text_in(&self, column: &str, members: &[Value]) -> SqlFragment {
        self.in_list(column, members)
    }

    fn text_match(&self, column: &str, op: TextOp, needle: &str) -> SqlFragment {
        let escape = self.like_escape();
        match op {
            TextOp::EqualIgnoreCase => SqlFragment::new(
                format!("LOWER({column}) = LOWER(?)"),
                vec![Value::from(needle)],
            ),
            _ if op.ignores_case() => SqlFragment::new(
                format!("LOWER({column}) LIKE LOWER(?) ESCAPE {escape}"),
                vec![Value::Text(like_pattern(op, needle))],
            ),
            _ => SqlFragment::new(
                format!("{column} LIKE ? ESCAPE {escape}"),
                vec![Value::Text(like_pattern(op, needle))],
            ),
        }
    }

    fn is_empty(&self, column: &str) -> SqlFragment {
        SqlFragment::raw(format!("{column} = ''"))
    }

    /// The `ESCAPE` literal, as written in this dialect's string syntax.
    fn like_escape(&self) -> &'static str {
        "'\\'"
    }
}

/// Case-sensitive comparisons, `LOWER` for case folding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

impl PredicateRenderer for DefaultRenderer {
    fn name(&self) -> &'static str {
        "default"
    }
}

/// Render one predicate through a renderer's override set.
pub fn render_predicate<R: PredicateRenderer + ?Sized>(
    renderer: &R,
    predicate: &FieldPredicate,
    column: ColumnRef<'_>,
) -> Result<SqlFragment, RenderError> {
    let col = column.sql;
    let textual = column.declared.is_textual();

    let inner = match &predicate.op {
        PredicateOp::Constant { value: true } => SqlFragment::raw("1 = 1"),
        PredicateOp::Constant { value: false } => SqlFragment::raw("1 = 0"),
        PredicateOp::IsNull => {
            // IS NOT NULL is its own operator, not NOT(IS NULL)
            let sql = if predicate.negated {
                format!("({col} IS NOT NULL)")
            } else {
                format!("({col} IS NULL)")
            };
            return Ok(SqlFragment::raw(sql));
        }
        PredicateOp::Compare { cmp, value } if textual => renderer.text_compare(col, *cmp, value),
        PredicateOp::Compare { cmp, value } => renderer.compare(col, *cmp, value),
        PredicateOp::Between {
            low,
            high,
            inclusion,
        } => {
            let (lower, upper) = if textual {
                (
                    renderer.text_compare(col, inclusion.lower_op(), low),
                    renderer.text_compare(col, inclusion.upper_op(), high),
                )
            } else {
                (
                    renderer.compare(col, inclusion.lower_op(), low),
                    renderer.compare(col, inclusion.upper_op(), high),
                )
            };
            SqlFragment::and_all([lower, upper]).unwrap_or_default()
        }
        // An empty member list arriving from a document is always-false
        PredicateOp::In { values } if values.is_empty() => SqlFragment::raw("1 = 0"),
        PredicateOp::In { values } if textual => renderer.text_in(col, values),
        PredicateOp::In { values } => renderer.in_list(col, values),
        PredicateOp::Text { text_op, value } => {
            if !textual {
                return Err(unsupported(predicate, column));
            }
            renderer.text_match(col, *text_op, value)
        }
        PredicateOp::IsEmpty => {
            if !textual {
                return Err(unsupported(predicate, column));
            }
            renderer.is_empty(col)
        }
    };

    let fragment = inner.parenthesized();
    Ok(if predicate.negated {
        fragment.negated()
    } else {
        fragment
    })
}

fn unsupported(predicate: &FieldPredicate, column: ColumnRef<'_>) -> RenderError {
    RenderError::UnsupportedPredicate {
        kind: predicate.kind(),
        column: column.sql.to_string(),
        declared: column.declared.clone(),
    }
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape `\`, `%` and `_` in a `LIKE` operand and add the wildcards the
/// operator needs. The escape character is always a backslash.
pub fn like_pattern(op: TextOp, needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    match op {
        TextOp::EqualIgnoreCase => escaped,
        TextOp::StartsWith | TextOp::StartsWithIgnoreCase => format!("{escaped}%"),
        TextOp::EndsWith | TextOp::EndsWithIgnoreCase => format!("%{escaped}"),
        TextOp::Contains | TextOp::ContainsIgnoreCase => format!("%{escaped}%"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstream_ir::{Field, Inclusion};

    const AGE: Field<i64> = Field::new("age");
    const NAME: Field<String> = Field::new("name");

    fn int_col() -> ColumnRef<'static> {
        ColumnRef {
            sql: "age",
            declared: &DeclaredType::Integer,
        }
    }

    fn text_col() -> ColumnRef<'static> {
        ColumnRef {
            sql: "name",
            declared: &DeclaredType::Varchar(None),
        }
    }

    #[test]
    fn test_compare() {
        let f = DefaultRenderer.render(&AGE.greater_than(18), int_col()).unwrap();
        assert_eq!(f.sql(), "(age > ?)");
        assert_eq!(f.params(), &[Value::Int(18)]);
    }

    #[test]
    fn test_between_modes() {
        let cases = [
            (Inclusion::Exclusive, "(age > ? AND age < ?)"),
            (Inclusion::StartInclusive, "(age >= ? AND age < ?)"),
            (Inclusion::EndInclusive, "(age > ? AND age <= ?)"),
            (Inclusion::Inclusive, "(age >= ? AND age <= ?)"),
        ];
        for (inclusion, expected) in cases {
            let f = DefaultRenderer
                .render(&AGE.between_with(10, 20, inclusion), int_col())
                .unwrap();
            assert_eq!(f.sql(), expected);
            assert_eq!(f.params(), &[Value::Int(10), Value::Int(20)]);
        }
    }

    #[test]
    fn test_not_in_wraps_whole_fragment() {
        let f = DefaultRenderer.render(&AGE.not_in([1, 2, 3]), int_col()).unwrap();
        assert_eq!(f.sql(), "(NOT (age IN (?, ?, ?)))");
        assert_eq!(f.params().len(), 3);
    }

    #[test]
    fn test_null_checks() {
        let f = DefaultRenderer.render(&AGE.is_not_null(), int_col()).unwrap();
        assert_eq!(f.sql(), "(age IS NOT NULL)");
        assert!(f.params().is_empty());
    }

    #[test]
    fn test_starts_with_escapes_wildcards() {
        let f = DefaultRenderer.render(&NAME.starts_with("50%_a"), text_col()).unwrap();
        assert_eq!(f.sql(), "(name LIKE ? ESCAPE '\\')");
        assert_eq!(f.params(), &[Value::from("50\\%\\_a%")]);
    }

    #[test]
    fn test_ignore_case_uses_lower() {
        let f = DefaultRenderer
            .render(&NAME.equal_ignore_case("Bob"), text_col())
            .unwrap();
        assert_eq!(f.sql(), "(LOWER(name) = LOWER(?))");
    }

    #[test]
    fn test_text_op_on_numeric_column_fails_fast() {
        let p = FieldPredicate::text("age", TextOp::Contains, "1");
        let err = DefaultRenderer.render(&p, int_col()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnsupportedPredicate {
                kind: PredicateKind::Contains,
                ..
            }
        ));
    }

    #[test]
    fn test_constants() {
        let f = DefaultRenderer.render(&AGE.in_set([]), int_col()).unwrap();
        assert_eq!(f.sql(), "(1 = 0)");
        let f = DefaultRenderer.render(&AGE.not_in([]), int_col()).unwrap();
        assert_eq!(f.sql(), "(1 = 1)");
    }

    #[test]
    fn test_raw_empty_in_never_renders_empty_list() {
        let raw = FieldPredicate::new("age", PredicateOp::In { values: vec![] });
        let f = DefaultRenderer.render(&raw, int_col()).unwrap();
        assert_eq!(f.sql(), "(1 = 0)");
        assert!(f.params().is_empty());

        let f = DefaultRenderer.render(&raw.negate(), text_col()).unwrap();
        assert_eq!(f.sql(), "(NOT (1 = 0))");
    }
}
