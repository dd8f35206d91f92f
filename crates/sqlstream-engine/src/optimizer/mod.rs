//! Pushdown planning
//!
//! Decides, once per terminal call, how much of a pipeline becomes SQL and
//! what is replayed in memory. See [`planner::plan`].

mod planner;

pub use planner::{can_push_down, plan, Plan, Window};

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlstream_ir::{CompiledQuery, DeclaredType, FieldId};

/// Configuration for the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Translate eligible pipeline prefixes to SQL
    pub enable_pushdown: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enable_pushdown: true,
        }
    }
}

impl OptimizerConfig {
    /// Every action is evaluated in memory over `SELECT *`.
    pub fn disabled() -> Self {
        Self {
            enable_pushdown: false,
        }
    }
}

/// Why a pipeline was not pushed down at all.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Disabled,
    OpaqueFilter { position: usize },
    UnknownField(FieldId),
    UnsupportedType { field: FieldId, declared: DeclaredType },
    /// Skip/limit the dialect cannot express: anywhere in the pipeline when
    /// the dialect has no skip/limit at all, otherwise where the pushed
    /// prefix reaches it without a preceding sort
    SkipLimitUnsupported { position: usize },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Disabled => write!(f, "pushdown disabled"),
            FallbackReason::OpaqueFilter { position } => {
                write!(f, "opaque filter at position {position}")
            }
            FallbackReason::UnknownField(field) => write!(f, "no column for field {field}"),
            FallbackReason::UnsupportedType { field, declared } => {
                write!(f, "type {declared} of field {field} not supported by dialect")
            }
            FallbackReason::SkipLimitUnsupported { position } => {
                write!(f, "skip/limit at position {position} not expressible in dialect")
            }
        }
    }
}

/// Description of how a pipeline would execute, produced without touching
/// the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub statement: CompiledQuery,
    /// Set when `count()` would be a single `COUNT(*)` statement
    pub count_statement: Option<CompiledQuery>,
    pub pushed: Vec<String>,
    pub residual: Vec<String>,
    pub fallback_reason: Option<String>,
}
