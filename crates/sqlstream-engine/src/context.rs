use std::sync::Arc;

use sqlstream_dialect::DialectDescriptor;
use sqlstream_ir::{ColumnResolver, DeclaredType, FieldId, TableSchema};

/// Everything a terminal needs to compile a statement against one
/// relation: its SQL name, field-to-column resolution and the dialect.
#[derive(Clone)]
pub struct QueryContext {
    relation: String,
    resolver: Arc<dyn ColumnResolver>,
    dialect: Arc<DialectDescriptor>,
}

impl QueryContext {
    /// `relation` is used verbatim in `FROM`.
    pub fn new(
        relation: impl Into<String>,
        resolver: Arc<dyn ColumnResolver>,
        dialect: Arc<DialectDescriptor>,
    ) -> Self {
        Self {
            relation: relation.into(),
            resolver,
            dialect,
        }
    }

    pub fn for_table(table: TableSchema, dialect: Arc<DialectDescriptor>) -> Self {
        let relation = dialect.qualified_name(table.schema.as_deref(), &table.name);
        Self::new(relation, Arc::new(table), dialect)
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn dialect(&self) -> &DialectDescriptor {
        &self.dialect
    }

    pub fn dialect_arc(&self) -> Arc<DialectDescriptor> {
        Arc::clone(&self.dialect)
    }

    /// Quoted column for a field
    pub fn column_sql(&self, field: &FieldId) -> Option<String> {
        self.resolver
            .column_name(field)
            .map(|name| self.dialect.quote_identifier(name))
    }

    pub fn declared_type(&self, field: &FieldId) -> Option<&DeclaredType> {
        self.resolver.declared_type(field)
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("relation", &self.relation)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstream_dialect::presets;

    #[test]
    fn test_for_table_quotes_relation() {
        let table = TableSchema::new("people")
            .in_schema("main")
            .column("age", DeclaredType::Integer);
        let ctx = QueryContext::for_table(table, Arc::new(presets::mysql()));
        assert_eq!(ctx.relation(), "`main`.`people`");
        assert_eq!(ctx.column_sql(&"age".into()).as_deref(), Some("`age`"));
        assert!(ctx.column_sql(&"height".into()).is_none());
    }
}
