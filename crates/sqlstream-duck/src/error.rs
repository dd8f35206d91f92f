use sqlstream_engine::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuckError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Table '{0}' not found in database")]
    UnknownTable(String),

    #[error("Column {column} holds a value of unsupported type {type_name}")]
    UnsupportedValue { column: String, type_name: String },

    #[error("Count query returned {0}")]
    InvalidCount(i64),
}

/// The driver error stays reachable through `source()`.
impl From<DuckError> for BackendError {
    fn from(err: DuckError) -> Self {
        let message = match &err {
            DuckError::Database(_) => "DuckDB statement failed".to_string(),
            other => other.to_string(),
        };
        BackendError::with_source(message, err)
    }
}
