//! Column resolution for entity fields

use crate::{DeclaredType, FieldId};

/// Resolves entity fields to backing columns.
pub trait ColumnResolver: Send + Sync {
    /// Unquoted column name for a field
    fn column_name(&self, field: &FieldId) -> Option<&str>;

    /// Declared database type of a field's column
    fn declared_type(&self, field: &FieldId) -> Option<&DeclaredType>;
}

/// Column metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub field: FieldId,
    pub name: String,
    pub declared: DeclaredType,
    pub nullable: bool,
}

/// Backing relation of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a nullable column whose name equals the field id
    pub fn column(self, name: &str, declared: DeclaredType) -> Self {
        self.column_as(FieldId::new(name), name, declared)
    }

    pub fn column_as(mut self, field: FieldId, name: &str, declared: DeclaredType) -> Self {
        self.columns.push(ColumnInfo {
            field,
            name: name.to_string(),
            declared,
            nullable: true,
        });
        self
    }

    pub fn find(&self, field: &FieldId) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| &c.field == field)
    }
}

impl ColumnResolver for TableSchema {
    fn column_name(&self, field: &FieldId) -> Option<&str> {
        self.find(field).map(|c| c.name.as_str())
    }

    fn declared_type(&self, field: &FieldId) -> Option<&DeclaredType> {
        self.find(field).map(|c| &c.declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_renamed_column() {
        let schema = TableSchema::new("people")
            .column("id", DeclaredType::BigInt)
            .column_as(FieldId::new("displayName"), "display_name", DeclaredType::Text);

        let field = FieldId::new("displayName");
        assert_eq!(schema.column_name(&field), Some("display_name"));
        assert_eq!(schema.declared_type(&field), Some(&DeclaredType::Text));
        assert_eq!(schema.column_name(&FieldId::new("missing")), None);
    }
}
