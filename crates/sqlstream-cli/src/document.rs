//! JSON query documents
//!
//! ```json
//! {
//!   "table": "people",
//!   "filters": [
//!     {"field": "age", "op": {"op": "compare", "cmp": "gt", "value": 18}},
//!     {"field": "name", "op": {"op": "text", "text_op": "starts_with", "value": "A"}, "negated": true}
//!   ],
//!   "sort": [{"field": "age", "descending": true, "nulls": "first"}],
//!   "limit": 10
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlstream_engine::{FieldAccess, Query};
use sqlstream_ir::{DeclaredType, FieldPredicate, ParseTypeError, SortKey, TableSchema};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read query document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse query document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column {column}: {source}")]
    ColumnType {
        column: String,
        source: ParseTypeError,
    },
}

/// A column declared inline, for explaining queries without a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub declared: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDocument {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDecl>,
    #[serde(default)]
    pub filters: Vec<FieldPredicate>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Print the row count instead of the rows
    #[serde(default)]
    pub count: bool,
}

impl QueryDocument {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Schema from the inline column list, if the document has one.
    pub fn inline_schema(&self) -> Result<Option<TableSchema>, DocumentError> {
        if self.columns.is_empty() {
            return Ok(None);
        }

        let mut schema = TableSchema::new(self.table.as_str());
        if let Some(name) = &self.schema {
            schema = schema.in_schema(name.as_str());
        }
        for column in &self.columns {
            let declared = column.declared.parse::<DeclaredType>().map_err(|source| {
                DocumentError::ColumnType {
                    column: column.name.clone(),
                    source,
                }
            })?;
            schema = schema.column(&column.name, declared);
        }
        Ok(Some(schema))
    }

    /// Record the document's operations on `query`: filters, then the sort,
    /// then the window.
    pub fn apply<T>(&self, mut query: Query<T>) -> Query<T>
    where
        T: FieldAccess + Send + 'static,
    {
        for predicate in &self.filters {
            query = query.filter(predicate.clone());
        }
        if !self.sort.is_empty() {
            query = query.sorted(self.sort.iter().cloned());
        }
        if let Some(n) = self.skip {
            query = query.skip(n);
        }
        if let Some(n) = self.limit {
            query = query.limit(n);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstream_ir::{CompareOp, NullsOrder, PredicateOp, Value};

    const DOC: &str = r#"{
        "table": "people",
        "columns": [{"name": "age", "type": "INTEGER"}, {"name": "name", "type": "VARCHAR(40)"}],
        "filters": [
            {"field": "age", "op": {"op": "compare", "cmp": "gt", "value": 18}},
            {"field": "name", "op": {"op": "text", "text_op": "starts_with", "value": "A"}, "negated": true}
        ],
        "sort": [{"field": "age", "descending": true, "nulls": "first"}],
        "limit": 10
    }"#;

    #[test]
    fn test_parse_document() {
        let doc: QueryDocument = serde_json::from_str(DOC).unwrap();
        assert_eq!(doc.filters.len(), 2);
        assert_eq!(
            doc.filters[0].op,
            PredicateOp::Compare {
                cmp: CompareOp::Gt,
                value: Value::Int(18)
            }
        );
        assert!(doc.filters[1].negated);
        assert_eq!(doc.sort[0].nulls, NullsOrder::First);
        assert_eq!(doc.limit, Some(10));
        assert!(!doc.count);
    }

    #[test]
    fn test_inline_schema() {
        let doc: QueryDocument = serde_json::from_str(DOC).unwrap();
        let schema = doc.inline_schema().unwrap().unwrap();
        assert_eq!(schema.columns[1].declared, DeclaredType::Varchar(Some(40)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = serde_json::from_str::<QueryDocument>(r#"{"table": "t", "limt": 3}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_bad_column_type() {
        let doc: QueryDocument = serde_json::from_str(
            r#"{"table": "t", "columns": [{"name": "g", "type": "GEOMETRY"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.inline_schema(),
            Err(DocumentError::ColumnType { column, .. }) if column == "g"
        ));
    }
}
