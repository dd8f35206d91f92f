use sqlstream_ir::{CompareOp, SqlFragment, TextOp, Value};

use super::{like_pattern, placeholders, PredicateRenderer};

const BINARY: &str = "utf8mb4_bin";
const CASE_INSENSITIVE: &str = "utf8mb4_general_ci";

/// MySQL compares strings under the column collation, which is usually
/// case-insensitive. Case-sensitive operators force a binary collation and
/// the ignore-case ones force a `_ci` collation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlRenderer;

impl PredicateRenderer for MySqlRenderer {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn text_compare(&self, column: &str, cmp: CompareOp, operand: &Value) -> SqlFragment {
        SqlFragment::new(
            format!("{column} {} ? COLLATE {BINARY}", cmp.sql()),
            vec![operand.clone()],
        )
    }

    fn text_in(&self, column: &str, members: &[Value]) -> SqlFragment {
        SqlFragment::new(
            format!(
                "{column} COLLATE {BINARY} IN ({})",
                placeholders(members.len())
            ),
            members.to_vec(),
        )
    }

    fn text_match(&self, column: &str, op: TextOp, needle: &str) -> SqlFragment {
        let collation = if op.ignores_case() {
            CASE_INSENSITIVE
        } else {
            BINARY
        };
        match op {
            TextOp::EqualIgnoreCase => SqlFragment::new(
                format!("{column} = ? COLLATE {collation}"),
                vec![Value::from(needle)],
            ),
            _ => SqlFragment::new(
                format!(
                    "{column} LIKE ? COLLATE {collation} ESCAPE {}",
                    self.like_escape()
                ),
                vec![Value::Text(like_pattern(op, needle))],
            ),
        }
    }

    // Backslash is an escape character inside MySQL string literals
    fn like_escape(&self) -> &'static str {
        "'\\\\'"
    }
}
