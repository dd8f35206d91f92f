//! sqlstream query engine
//!
//! Records a pipeline of intermediate operations (`filter`, `map`,
//! `sorted`, `distinct`, `skip`, `limit`, `peek`) over a relation and, at
//! the terminal call, translates the longest SQL-expressible prefix into a
//! single parameterized statement for the configured dialect. Whatever
//! cannot be expressed in SQL is replayed in memory, so results are the same
//! with or without pushdown.
//!
//! ```ignore
//! const AGE: Field<i64> = Field::new("age");
//!
//! let adults = people
//!     .query()
//!     .filter(AGE.greater_than(18))
//!     .filter(AGE.less_than(65))
//!     .count()?;
//! // SELECT COUNT(*) FROM "people" WHERE ("age" > ?) AND ("age" < ?)
//! ```

pub mod context;
pub mod error;
pub mod mutation;
pub mod optimizer;
pub mod pipeline;
pub mod query;
pub mod replay;
pub mod row;
pub mod source;
pub mod stream;

pub use context::QueryContext;
pub use error::{BackendError, MapError, QueryError, Result};
pub use mutation::{CompiledMutation, Delete, GeneratedKeys, Insert, Mutation, Update};
pub use optimizer::{FallbackReason, OptimizerConfig, QueryPlan};
pub use pipeline::{Action, ActionTraits, Pipeline};
pub use query::{Query, Table};
pub use row::{FieldAccess, RawRow, RawRowMapper, RowMapper};
pub use source::{BufferedCursor, ConnectionSource, PartitionStrategy, RowCursor};
pub use stream::{CloseHandle, RowSequence, SequenceState};
