//! Table schemas from the DuckDB information schema

use duckdb::Connection;
use sqlstream_ir::{ColumnInfo, DeclaredType, FieldId, TableSchema};
use tracing::{debug, warn};

use crate::error::DuckError;

/// Resolve a table's columns. Field ids equal the column names; columns of a
/// type sqlstream cannot compare are left out, so predicates on them fall
/// back to in-memory evaluation.
pub fn load_table_schema(conn: &Connection, table_name: &str) -> Result<TableSchema, DuckError> {
    let query = "
        SELECT table_schema, column_name, data_type, is_nullable
        FROM information_schema.columns
        WHERE table_name = ?
        ORDER BY ordinal_position
    ";

    let mut stmt = conn.prepare(query)?;
    let rows = stmt
        .query_map([table_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)? == "YES",
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let Some((schema_name, ..)) = rows.first() else {
        return Err(DuckError::UnknownTable(table_name.to_string()));
    };

    let mut schema = TableSchema::new(table_name);
    if schema_name != "main" {
        schema = schema.in_schema(schema_name.clone());
    }

    for (_, name, data_type, nullable) in rows {
        match data_type.parse::<DeclaredType>() {
            Ok(declared) => schema.columns.push(ColumnInfo {
                field: FieldId::new(name.as_str()),
                name,
                declared,
                nullable,
            }),
            Err(e) => warn!(table = table_name, column = %name, error = %e, "Skipping column"),
        }
    }

    debug!(table = table_name, columns = schema.columns.len(), "Loaded table schema");
    Ok(schema)
}
