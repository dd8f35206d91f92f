//! Raw rows and entity mapping

use std::sync::Arc;

use serde::{Serialize, Serializer};
use sqlstream_ir::{FieldId, Value};

use crate::error::MapError;

/// One fetched row. Column names are shared by every row of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl RawRow {
    /// A short `values` leaves the trailing columns unreadable rather than
    /// panicking on access.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value of a column by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn require(&self, column: &str) -> Result<&Value, MapError> {
        self.get(column)
            .ok_or_else(|| MapError::MissingColumn(column.to_string()))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, MapError> {
        match self.require(column)? {
            Value::Int(n) => Ok(*n),
            _ => Err(MapError::TypeMismatch {
                column: column.to_string(),
                expected: "integer",
            }),
        }
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, MapError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            _ => self.get_i64(column).map(Some),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<String, MapError> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(MapError::TypeMismatch {
                column: column.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>, MapError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            _ => self.get_string(column).map(Some),
        }
    }
}

/// Rows serialize as JSON objects keyed by column name.
impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Converts raw rows to entities.
pub trait RowMapper<T>: Send + Sync {
    fn map_row(&self, row: &RawRow) -> Result<T, MapError>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&RawRow) -> Result<T, MapError> + Send + Sync,
{
    fn map_row(&self, row: &RawRow) -> Result<T, MapError> {
        self(row)
    }
}

/// Passes rows through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawRowMapper;

impl RowMapper<RawRow> for RawRowMapper {
    fn map_row(&self, row: &RawRow) -> Result<RawRow, MapError> {
        Ok(row.clone())
    }
}

/// Field values of an entity, used when field predicates and field sorts
/// are evaluated in memory. Unknown fields read as `NULL`.
pub trait FieldAccess {
    fn field_value(&self, field: &FieldId) -> Value;
}

impl FieldAccess for RawRow {
    fn field_value(&self, field: &FieldId) -> Value {
        self.get(field.as_str()).cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RawRow {
        RawRow::new(
            Arc::from(vec!["id".to_string(), "name".to_string()]),
            vec![Value::Int(7), Value::Null],
        )
    }

    #[test]
    fn test_typed_getters() {
        let row = row();
        assert_eq!(row.get_i64("id"), Ok(7));
        assert_eq!(row.get_opt_string("name"), Ok(None));
        assert!(matches!(row.get_string("id"), Err(MapError::TypeMismatch { .. })));
        assert_eq!(
            row.get_i64("missing"),
            Err(MapError::MissingColumn("missing".into()))
        );
    }

    #[test]
    fn test_short_row_reads_missing() {
        let row = RawRow::new(
            Arc::from(vec!["id".to_string(), "name".to_string()]),
            vec![Value::Int(7)],
        );
        assert_eq!(row.get("name"), None);
        assert_eq!(
            row.get_opt_string("name"),
            Err(MapError::MissingColumn("name".into()))
        );
        assert_eq!(row.field_value(&FieldId::from("name")), Value::Null);
    }

    #[test]
    fn test_serializes_as_object() {
        let json = serde_json::to_value(row()).unwrap();
        assert_eq!(json, serde_json::json!({"id": 7, "name": null}));
    }
}
