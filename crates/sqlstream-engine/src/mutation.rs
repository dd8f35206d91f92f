//! Delete, update and insert statements
//!
//! Mutations are always compiled to SQL; unlike queries there is no
//! in-memory fallback, so an unknown field is an error.

use sqlstream_dialect::ColumnRef;
use sqlstream_ir::{CompiledQuery, FieldId, FieldPredicate, SqlFragment, Value};
use tracing::debug;

use crate::context::QueryContext;
use crate::error::{QueryError, Result};
use crate::source::ConnectionSource;

/// Keys generated by inserts, accumulated across the calls it is moved
/// through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedKeys {
    keys: Vec<Value>,
}

impl GeneratedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: Value) {
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.keys
    }
}

/// A mutation compiled for one dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMutation {
    pub statement: CompiledQuery,
    /// The statement returns generated keys as its first column
    pub returning: bool,
}

pub trait Mutation {
    fn compile(&self, ctx: &QueryContext) -> Result<CompiledMutation>;
}

#[derive(Debug, Clone, Default)]
pub struct Delete {
    predicates: Vec<FieldPredicate>,
}

impl Delete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: FieldPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl Mutation for Delete {
    fn compile(&self, ctx: &QueryContext) -> Result<CompiledMutation> {
        let (sql, params) = where_clause(ctx, &self.predicates)?;
        Ok(CompiledMutation {
            statement: CompiledQuery::new(format!("DELETE FROM {}{sql}", ctx.relation()), params),
            returning: false,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Update {
    assignments: Vec<(FieldId, Value)>,
    predicates: Vec<FieldPredicate>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<FieldId>, value: impl Into<Value>) -> Self {
        self.assignments.push((field.into(), value.into()));
        self
    }

    pub fn filter(mut self, predicate: FieldPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl Mutation for Update {
    fn compile(&self, ctx: &QueryContext) -> Result<CompiledMutation> {
        if self.assignments.is_empty() {
            return Err(QueryError::InvalidMutation(
                "update without assignments".into(),
            ));
        }

        let mut params = Vec::with_capacity(self.assignments.len());
        let mut sets = Vec::with_capacity(self.assignments.len());
        for (field, value) in &self.assignments {
            sets.push(format!("{} = ?", column(ctx, field)?));
            params.push(value.clone());
        }

        let (where_sql, where_params) = where_clause(ctx, &self.predicates)?;
        params.extend(where_params);

        Ok(CompiledMutation {
            statement: CompiledQuery::new(
                format!("UPDATE {} SET {}{where_sql}", ctx.relation(), sets.join(", ")),
                params,
            ),
            returning: false,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Insert {
    values: Vec<(FieldId, Value)>,
    generated_key: Option<FieldId>,
}

impl Insert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, field: impl Into<FieldId>, value: impl Into<Value>) -> Self {
        self.values.push((field.into(), value.into()));
        self
    }

    /// Collect this field's generated value, where the dialect can return it.
    pub fn returning(mut self, field: impl Into<FieldId>) -> Self {
        self.generated_key = Some(field.into());
        self
    }
}

impl Mutation for Insert {
    fn compile(&self, ctx: &QueryContext) -> Result<CompiledMutation> {
        if self.values.is_empty() {
            return Err(QueryError::InvalidMutation("insert without values".into()));
        }

        let columns = self
            .values
            .iter()
            .map(|(field, _)| column(ctx, field))
            .collect::<Result<Vec<_>>>()?;
        let params: Vec<Value> = self.values.iter().map(|(_, v)| v.clone()).collect();
        let placeholders = vec!["?"; params.len()].join(", ");

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            ctx.relation(),
            columns.join(", ")
        );

        let mut returning = false;
        if let Some(key) = &self.generated_key {
            if ctx.dialect().supports_returning() {
                sql.push_str(&format!(" RETURNING {}", column(ctx, key)?));
                returning = true;
            } else {
                debug!(
                    dialect = ctx.dialect().name(),
                    field = %key,
                    "Dialect cannot return generated keys"
                );
            }
        }

        Ok(CompiledMutation {
            statement: CompiledQuery::new(sql, params),
            returning,
        })
    }
}

/// Compile and run a mutation, threading `keys` through the backend call.
pub fn execute(
    source: &dyn ConnectionSource,
    ctx: &QueryContext,
    mutation: &dyn Mutation,
    keys: GeneratedKeys,
) -> Result<(u64, GeneratedKeys)> {
    let compiled = mutation.compile(ctx)?;
    debug!(
        sql = %compiled.statement.sql,
        params = ?compiled.statement.params,
        returning = compiled.returning,
        "Executing mutation"
    );
    let (affected, keys) =
        source.execute_mutation(&compiled.statement, compiled.returning, keys)?;
    Ok((affected, keys))
}

fn column(ctx: &QueryContext, field: &FieldId) -> Result<String> {
    ctx.column_sql(field)
        .ok_or_else(|| QueryError::UnknownField(field.clone()))
}

fn where_clause(ctx: &QueryContext, predicates: &[FieldPredicate]) -> Result<(String, Vec<Value>)> {
    let mut fragments = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        let sql = column(ctx, &predicate.field)?;
        let declared = ctx
            .declared_type(&predicate.field)
            .ok_or_else(|| QueryError::UnknownField(predicate.field.clone()))?;
        fragments.push(ctx.dialect().render_predicate(
            predicate,
            ColumnRef {
                sql: &sql,
                declared,
            },
        )?);
    }

    Ok(match SqlFragment::and_all(fragments) {
        Some(fragment) => {
            let (sql, params) = fragment.into_parts();
            (format!(" WHERE {sql}"), params)
        }
        None => (String::new(), Vec::new()),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use sqlstream_dialect::presets;
    use sqlstream_ir::{DeclaredType, Field, TableSchema};

    const AGE: Field<i64> = Field::new("age");

    fn ctx(dialect: sqlstream_dialect::DialectDescriptor) -> QueryContext {
        let table = TableSchema::new("people")
            .column("id", DeclaredType::BigInt)
            .column("name", DeclaredType::Text)
            .column("age", DeclaredType::Integer);
        QueryContext::for_table(table, Arc::new(dialect))
    }

    #[test]
    fn test_delete() {
        let m = Delete::new()
            .filter(AGE.less_than(18))
            .compile(&ctx(presets::duckdb()))
            .unwrap();
        assert_eq!(
            m.statement.sql,
            "DELETE FROM \"people\" WHERE (\"age\" < ?)"
        );
        assert_eq!(m.statement.params, vec![Value::Int(18)]);
    }

    #[test]
    fn test_update_params_in_order() {
        let m = Update::new()
            .set("name", "adult")
            .filter(AGE.greater_or_equal(18))
            .compile(&ctx(presets::mysql()))
            .unwrap();
        assert_eq!(
            m.statement.sql,
            "UPDATE `people` SET `name` = ? WHERE (`age` >= ?)"
        );
        assert_eq!(m.statement.params, vec![Value::from("adult"), Value::Int(18)]);
    }

    #[test]
    fn test_insert_returning_depends_on_dialect() {
        let insert = Insert::new().value("name", "ann").value("age", 30).returning("id");

        let m = insert.compile(&ctx(presets::postgres())).unwrap();
        assert_eq!(
            m.statement.sql,
            "INSERT INTO \"people\" (\"name\", \"age\") VALUES (?, ?) RETURNING \"id\""
        );
        assert!(m.returning);

        let m = insert.compile(&ctx(presets::mysql())).unwrap();
        assert!(!m.statement.sql.contains("RETURNING"));
        assert!(!m.returning);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let err = Update::new()
            .set("height", 3)
            .compile(&ctx(presets::duckdb()))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(f) if f.as_str() == "height"));
    }
}
