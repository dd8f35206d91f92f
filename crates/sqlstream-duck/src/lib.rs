//! DuckDB backend for sqlstream
//!
//! Executes compiled statements on an in-process DuckDB connection and
//! resolves table schemas from `information_schema`.

mod catalog;
mod convert;
mod error;
mod source;

pub use catalog::load_table_schema;
pub use error::DuckError;
pub use source::DuckSource;
