//! Error types

use std::error::Error as StdError;

use sqlstream_dialect::RenderError;
use sqlstream_ir::FieldId;
use thiserror::Error;

/// Failure reported by a connection source. The driver error, when there is
/// one, is kept as the `source()`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Row could not be converted to the entity type
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} is not a {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Row sequence is closed")]
    ResourceClosed,

    #[error("Row mapping failed: {0}")]
    RowMapping(#[from] MapError),

    #[error("Unknown field: {0}")]
    UnknownField(FieldId),

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket gone");
        let err = QueryError::from(BackendError::with_source("fetch failed", io));

        let backend = err.source().expect("backend error");
        assert_eq!(backend.to_string(), "fetch failed");
        assert_eq!(backend.source().map(|e| e.to_string()), Some("socket gone".into()));
    }
}
