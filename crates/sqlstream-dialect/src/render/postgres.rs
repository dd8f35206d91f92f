use sqlstream_ir::{CompareOp, SqlFragment, TextOp, Value};

use super::{like_pattern, placeholders, PredicateRenderer};

/// Casts both sides of string comparisons to `text` so `char(n)` padding
/// and `citext` columns compare like plain strings; case folding uses
/// `ILIKE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresRenderer;

impl PredicateRenderer for PostgresRenderer {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn text_compare(&self, column: &str, cmp: CompareOp, operand: &Value) -> SqlFragment {
        SqlFragment::new(
            format!("{column}::text {} ?::text", cmp.sql()),
            vec![operand.clone()],
        )
    }

    fn text_in(&self, column: &str, members: &[Value]) -> SqlFragment {
        SqlFragment::new(
            format!("{column}::text IN ({})", placeholders(members.len())),
            members.to_vec(),
        )
    }

    fn text_match(&self, column: &str, op: TextOp, needle: &str) -> SqlFragment {
        let escape = self.like_escape();
        let operator = if op.ignores_case() { "ILIKE" } else { "LIKE" };
        SqlFragment::new(
            format!("{column}::text {operator} ? ESCAPE {escape}"),
            vec![Value::Text(like_pattern(op, needle))],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ColumnRef;
    use sqlstream_ir::{DeclaredType, Field};

    const NAME: Field<String> = Field::new("name");

    fn col() -> ColumnRef<'static> {
        ColumnRef {
            sql: "\"name\"",
            declared: &DeclaredType::Text,
        }
    }

    #[test]
    fn test_compare_casts_to_text() {
        let f = PostgresRenderer
            .render(&NAME.less_than("m".to_string()), col())
            .unwrap();
        assert_eq!(f.sql(), "(\"name\"::text < ?::text)");
    }

    #[test]
    fn test_equal_ignore_case_is_escaped_ilike() {
        let f = PostgresRenderer
            .render(&NAME.equal_ignore_case("a_b"), col())
            .unwrap();
        assert_eq!(f.sql(), "(\"name\"::text ILIKE ? ESCAPE '\\')");
        assert_eq!(f.params(), &[Value::from("a\\_b")]);
    }

    #[test]
    fn test_negated_starts_with() {
        let f = PostgresRenderer
            .render(&NAME.starts_with("x").negate(), col())
            .unwrap();
        assert_eq!(f.sql(), "(NOT (\"name\"::text LIKE ? ESCAPE '\\'))");
    }
}
