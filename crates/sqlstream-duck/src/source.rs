//! `ConnectionSource` over an in-process DuckDB connection

use std::path::Path;
use std::sync::Arc;

use duckdb::{params_from_iter, Connection};
use parking_lot::Mutex;
use sqlstream_engine::{
    BackendError, BufferedCursor, ConnectionSource, GeneratedKeys, RawRow, RowCursor,
};
use sqlstream_ir::{CompiledQuery, TableSchema};
use tracing::{debug, trace};

use crate::catalog::load_table_schema;
use crate::convert::{value_from_ref, Param};
use crate::error::DuckError;

/// DuckDB result sets are fully fetched and handed out as
/// [`BufferedCursor`]s, which can be partitioned.
pub struct DuckSource {
    conn: Mutex<Connection>,
}

impl DuckSource {
    pub fn open_in_memory() -> Result<Self, DuckError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DuckError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run unparameterized SQL, e.g. DDL or fixtures.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DuckError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    pub fn table_schema(&self, table_name: &str) -> Result<TableSchema, DuckError> {
        load_table_schema(&self.conn.lock(), table_name)
    }

    fn fetch_all(&self, query: &CompiledQuery) -> Result<Vec<RawRow>, DuckError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query.sql)?;
        let mut rows = stmt.query(params_from_iter(query.params.iter().map(Param)))?;

        let mut columns: Option<Arc<[String]>> = None;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let names = match &columns {
                Some(names) => Arc::clone(names),
                None => {
                    let statement: &duckdb::Statement<'_> = row.as_ref();
                    let names: Arc<[String]> = Arc::from(statement.column_names());
                    columns = Some(Arc::clone(&names));
                    names
                }
            };

            let mut values = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                values.push(value_from_ref(row.get_ref(idx)?, name)?);
            }
            fetched.push(RawRow::new(names, values));
        }

        trace!(rows = fetched.len(), "Fetched result set");
        Ok(fetched)
    }

    fn count(&self, query: &CompiledQuery) -> Result<u64, DuckError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &query.sql,
            params_from_iter(query.params.iter().map(Param)),
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| DuckError::InvalidCount(count))
    }

    fn mutate(
        &self,
        statement: &CompiledQuery,
        returning: bool,
        mut keys: GeneratedKeys,
    ) -> Result<(u64, GeneratedKeys), DuckError> {
        let conn = self.conn.lock();
        let params = params_from_iter(statement.params.iter().map(Param));

        if !returning {
            let affected = conn.execute(&statement.sql, params)?;
            return Ok((affected as u64, keys));
        }

        // every returned row is one inserted row
        let mut stmt = conn.prepare(&statement.sql)?;
        let mut rows = stmt.query(params)?;
        let mut affected = 0u64;
        while let Some(row) = rows.next()? {
            keys.push(value_from_ref(row.get_ref(0)?, "returning")?);
            affected += 1;
        }
        Ok((affected, keys))
    }
}

impl ConnectionSource for DuckSource {
    fn query_count(&self, query: &CompiledQuery) -> Result<u64, BackendError> {
        debug!(sql = %query.sql, params = ?query.params, "DuckDB count");
        Ok(self.count(query)?)
    }

    fn query_rows(&self, query: &CompiledQuery) -> Result<Box<dyn RowCursor>, BackendError> {
        debug!(sql = %query.sql, params = ?query.params, "DuckDB query");
        let rows = self.fetch_all(query)?;
        Ok(Box::new(BufferedCursor::new(rows)))
    }

    fn execute_mutation(
        &self,
        statement: &CompiledQuery,
        returning: bool,
        keys: GeneratedKeys,
    ) -> Result<(u64, GeneratedKeys), BackendError> {
        Ok(self.mutate(statement, returning, keys)?)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use sqlstream_ir::Value;

    fn source() -> DuckSource {
        let source = DuckSource::open_in_memory().unwrap();
        source
            .execute_batch(
                "CREATE TABLE t (id INTEGER, label VARCHAR);
                 INSERT INTO t VALUES (1, 'a'), (2, NULL), (3, 'c');",
            )
            .unwrap();
        source
    }

    #[test]
    fn test_rows_share_column_names() {
        let mut cursor = source()
            .query_rows(&CompiledQuery::new("SELECT * FROM t WHERE id > ?", vec![Value::Int(1)]))
            .unwrap();
        assert_eq!(cursor.remaining(), Some(2));

        let first = cursor.next_raw().unwrap().unwrap();
        assert_eq!(first.columns(), ["id".to_string(), "label".to_string()]);
        assert_eq!(first.values(), [Value::Int(2), Value::Null]);
    }

    #[test]
    fn test_count() {
        let n = source()
            .query_count(&CompiledQuery::new("SELECT COUNT(*) FROM t", vec![]))
            .unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_driver_error_kept_as_source() {
        let err = source()
            .query_rows(&CompiledQuery::new("SELECT * FROM missing", vec![]))
            .err()
            .unwrap();
        assert_eq!(err.message(), "DuckDB statement failed");
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("missing"));
    }
}
