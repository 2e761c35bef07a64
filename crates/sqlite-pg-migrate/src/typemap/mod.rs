//! Type mapping from SQLite declared types to PostgreSQL.
//!
//! SQLite accepts any string as a column type, so mapping goes through a
//! small portable vocabulary first. The portable type only chooses the DDL;
//! sanitization works from what the target actually created.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-agnostic logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortableType {
    Integer,
    /// Text with optional maximum length.
    Text(Option<u32>),
    Blob,
    Double,
    /// Decimal with optional precision and scale.
    Decimal(Option<u32>, Option<u32>),
    Date,
    Boolean,
    Uuid,
}

/// Map a source declared type to a portable type.
///
/// Total and deterministic: unknown or malformed input maps to `Text(None)`.
pub fn map_type(raw: &str) -> PortableType {
    let upper = raw.trim().to_uppercase();

    if upper.contains("INT") {
        PortableType::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        PortableType::Text(parse_args(&upper).first().copied())
    } else if upper.contains("BLOB") {
        PortableType::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        PortableType::Double
    } else if upper.contains("DEC") || upper.contains("NUM") {
        let args = parse_args(&upper);
        PortableType::Decimal(args.first().copied(), args.get(1).copied())
    } else if upper.contains("DATE") || upper.contains("TIME") {
        PortableType::Date
    } else if upper == "BOOLEAN" {
        PortableType::Boolean
    } else if upper == "UUID" {
        PortableType::Uuid
    } else {
        PortableType::Text(None)
    }
}

/// Parse the comma-separated integers inside the first pair of parentheses.
///
/// Stops at the first argument that is not a plain non-negative integer.
fn parse_args(upper: &str) -> Vec<u32> {
    let Some(open) = upper.find('(') else {
        return Vec::new();
    };
    let Some(close) = upper[open..].find(')') else {
        return Vec::new();
    };
    upper[open + 1..open + close]
        .split(',')
        .map_while(|part| part.trim().parse::<u32>().ok())
        .collect()
}

impl PortableType {
    /// Render the PostgreSQL column type.
    pub fn to_postgres(&self) -> String {
        match self {
            PortableType::Integer => "bigint".to_string(),
            PortableType::Text(Some(len)) if *len > 0 && *len <= 10_485_760 => {
                format!("varchar({})", len)
            }
            PortableType::Text(_) => "text".to_string(),
            PortableType::Blob => "bytea".to_string(),
            PortableType::Double => "double precision".to_string(),
            PortableType::Decimal(Some(p), Some(s)) if (1..=1000).contains(p) && s <= p => {
                format!("numeric({},{})", p, s)
            }
            PortableType::Decimal(Some(p), _) if (1..=1000).contains(p) => format!("numeric({})", p),
            PortableType::Decimal(..) => "numeric".to_string(),
            PortableType::Date => "timestamp with time zone".to_string(),
            PortableType::Boolean => "boolean".to_string(),
            PortableType::Uuid => "uuid".to_string(),
        }
    }
}

impl fmt::Display for PortableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortableType::Integer => write!(f, "INTEGER"),
            PortableType::Text(Some(n)) => write!(f, "TEXT({})", n),
            PortableType::Text(None) => write!(f, "TEXT"),
            PortableType::Blob => write!(f, "BLOB"),
            PortableType::Double => write!(f, "DOUBLE"),
            PortableType::Decimal(Some(p), Some(s)) => write!(f, "DECIMAL({},{})", p, s),
            PortableType::Decimal(Some(p), None) => write!(f, "DECIMAL({})", p),
            PortableType::Decimal(..) => write!(f, "DECIMAL"),
            PortableType::Date => write!(f, "DATE"),
            PortableType::Boolean => write!(f, "BOOLEAN"),
            PortableType::Uuid => write!(f, "UUID"),
        }
    }
}
