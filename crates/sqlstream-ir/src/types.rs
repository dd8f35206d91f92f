//! Declared database types of entity columns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized column type: {0}")]
pub struct ParseTypeError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredType {
    // Primitives
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal { precision: u8, scale: u8 },

    // Text
    Char(Option<u32>),
    Varchar(Option<u32>),
    Text,

    // Temporal
    Date,
    Time,
    Timestamp,

    // Other
    Blob,
    Uuid,
}

/// Coarse grouping used by dialects to declare which types they can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Temporal,
    Binary,
    Uuid,
}

impl TypeFamily {
    pub const ALL: [TypeFamily; 8] = [
        TypeFamily::Boolean,
        TypeFamily::Integer,
        TypeFamily::Float,
        TypeFamily::Decimal,
        TypeFamily::Text,
        TypeFamily::Temporal,
        TypeFamily::Binary,
        TypeFamily::Uuid,
    ];
}

impl DeclaredType {
    /// Textual columns take the renderer's string path.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            DeclaredType::Char(_) | DeclaredType::Varchar(_) | DeclaredType::Text
        )
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            DeclaredType::Boolean => TypeFamily::Boolean,
            DeclaredType::SmallInt | DeclaredType::Integer | DeclaredType::BigInt => {
                TypeFamily::Integer
            }
            DeclaredType::Real | DeclaredType::Double => TypeFamily::Float,
            DeclaredType::Decimal { .. } => TypeFamily::Decimal,
            DeclaredType::Char(_) | DeclaredType::Varchar(_) | DeclaredType::Text => {
                TypeFamily::Text
            }
            DeclaredType::Date | DeclaredType::Time | DeclaredType::Timestamp => {
                TypeFamily::Temporal
            }
            DeclaredType::Blob => TypeFamily::Binary,
            DeclaredType::Uuid => TypeFamily::Uuid,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Boolean => f.write_str("BOOLEAN"),
            DeclaredType::SmallInt => f.write_str("SMALLINT"),
            DeclaredType::Integer => f.write_str("INTEGER"),
            DeclaredType::BigInt => f.write_str("BIGINT"),
            DeclaredType::Real => f.write_str("REAL"),
            DeclaredType::Double => f.write_str("DOUBLE"),
            DeclaredType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({precision},{scale})")
            }
            DeclaredType::Char(Some(n)) => write!(f, "CHAR({n})"),
            DeclaredType::Char(None) => f.write_str("CHAR"),
            DeclaredType::Varchar(Some(n)) => write!(f, "VARCHAR({n})"),
            DeclaredType::Varchar(None) => f.write_str("VARCHAR"),
            DeclaredType::Text => f.write_str("TEXT"),
            DeclaredType::Date => f.write_str("DATE"),
            DeclaredType::Time => f.write_str("TIME"),
            DeclaredType::Timestamp => f.write_str("TIMESTAMP"),
            DeclaredType::Blob => f.write_str("BLOB"),
            DeclaredType::Uuid => f.write_str("UUID"),
        }
    }
}

/// Parses type names as reported by `information_schema.columns`.
impl FromStr for DeclaredType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let (base, args) = match upper.split_once('(') {
            Some((base, rest)) => (base.trim(), Some(rest.trim_end_matches(')'))),
            None => (upper.as_str(), None),
        };
        let length = || args.and_then(|a| a.trim().parse::<u32>().ok());

        let ty = match base {
            "BOOLEAN" | "BOOL" => DeclaredType::Boolean,
            "SMALLINT" | "INT2" | "TINYINT" => DeclaredType::SmallInt,
            "INTEGER" | "INT" | "INT4" => DeclaredType::Integer,
            "BIGINT" | "INT8" | "HUGEINT" => DeclaredType::BigInt,
            "REAL" | "FLOAT" | "FLOAT4" => DeclaredType::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => DeclaredType::Double,
            "DECIMAL" | "NUMERIC" => {
                let (precision, scale) = args
                    .and_then(|a| a.split_once(','))
                    .and_then(|(p, s)| Some((p.trim().parse().ok()?, s.trim().parse().ok()?)))
                    .unwrap_or((18, 3));
                DeclaredType::Decimal { precision, scale }
            }
            "CHAR" | "CHARACTER" | "BPCHAR" => DeclaredType::Char(length()),
            "VARCHAR" | "CHARACTER VARYING" | "STRING" => DeclaredType::Varchar(length()),
            "TEXT" => DeclaredType::Text,
            "DATE" => DeclaredType::Date,
            "TIME" => DeclaredType::Time,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMP WITHOUT TIME ZONE" => DeclaredType::Timestamp,
            "BLOB" | "BYTEA" | "VARBINARY" | "BINARY" => DeclaredType::Blob,
            "UUID" => DeclaredType::Uuid,
            _ => return Err(ParseTypeError(s.to_string())),
        };
        Ok(ty)
    }
}
