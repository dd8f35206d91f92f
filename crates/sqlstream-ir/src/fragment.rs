//! SQL fragments and compiled statements

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Value;

/// Positional placeholder used by every dialect.
pub const PLACEHOLDER: char = '?';

/// A unit of SQL text plus the values bound to its placeholders, in order.
///
/// Fragments are composed by concatenation only; the text is never parsed
/// back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    sql: String,
    params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        let sql = sql.into();
        debug_assert_eq!(
            count_placeholders(&sql),
            params.len(),
            "placeholder/parameter mismatch in `{sql}`"
        );
        Self { sql, params }
    }

    /// Text with no placeholders.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    pub fn parenthesized(self) -> Self {
        Self {
            sql: format!("({})", self.sql),
            params: self.params,
        }
    }

    /// `(NOT <fragment>)`
    pub fn negated(self) -> Self {
        Self {
            sql: format!("(NOT {})", self.sql),
            params: self.params,
        }
    }

    /// Join fragments with `AND`, keeping parameters in input order.
    /// Returns `None` for an empty input.
    pub fn and_all(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<SqlFragment> {
        let mut iter = fragments.into_iter();
        let mut out = iter.next()?;
        for fragment in iter {
            out.sql.push_str(" AND ");
            out.sql.push_str(&fragment.sql);
            out.params.extend(fragment.params);
        }
        Some(out)
    }
}

/// Count placeholders outside quoted literals and quoted identifiers.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '[' => quote = Some(']'),
                PLACEHOLDER => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// A complete statement ready for a connection source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        let sql = sql.into();
        debug_assert_eq!(count_placeholders(&sql), params.len());
        Self { sql, params }
    }

    /// SHA-256 over the statement text and its parameters, usable as a
    /// prepared-statement cache key.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        // Value serialization cannot fail: no maps with non-string keys
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        hasher.update(params.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl From<SqlFragment> for CompiledQuery {
    fn from(fragment: SqlFragment) -> Self {
        let (sql, params) = fragment.into_parts();
        Self { sql, params }
    }
}
