//! Static type tags for expressions and values.
//!
//! `ExprType` is attached to every expression and value. It is used for
//! overload resolution and pushdown eligibility checks, not for runtime
//! branching on value contents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type tag of an expression or value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprType {
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    /// 32-bit floating point
    Float,
    /// 64-bit double precision
    Double,
    /// UTF-8 string
    String,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time without zone
    Datetime,
    /// Instant in time (UTC)
    Timestamp,
    /// Ordered mapping of field name to value
    Tuple,
    /// Ordered sequence of values
    Array,
    /// Type of NULL and MISSING literals; compatible with everything
    Undefined,
}

impl ExprType {
    /// Check whether this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ExprType::Integer | ExprType::Long | ExprType::Float | ExprType::Double
        )
    }

    /// Widening order for numeric promotion: INTEGER < LONG < FLOAT < DOUBLE
    fn numeric_width(&self) -> Option<u8> {
        match self {
            ExprType::Integer => Some(0),
            ExprType::Long => Some(1),
            ExprType::Float => Some(2),
            ExprType::Double => Some(3),
            _ => None,
        }
    }

    /// Result type of a binary numeric operation: the wider of the two
    /// operand types. Returns `None` when either side is not numeric.
    pub fn widest(a: ExprType, b: ExprType) -> Option<ExprType> {
        let (wa, wb) = (a.numeric_width()?, b.numeric_width()?);
        Some(if wa >= wb { a } else { b })
    }

    /// Whether two static types may legally meet in a comparison. Undefined
    /// (NULL/MISSING) is compatible with everything.
    pub fn is_compatible(&self, other: &ExprType) -> bool {
        self == other
            || *self == ExprType::Undefined
            || *other == ExprType::Undefined
            || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExprType::Integer => "INTEGER",
            ExprType::Long => "LONG",
            ExprType::Float => "FLOAT",
            ExprType::Double => "DOUBLE",
            ExprType::String => "STRING",
            ExprType::Boolean => "BOOLEAN",
            ExprType::Date => "DATE",
            ExprType::Time => "TIME",
            ExprType::Datetime => "DATETIME",
            ExprType::Timestamp => "TIMESTAMP",
            ExprType::Tuple => "TUPLE",
            ExprType::Array => "ARRAY",
            ExprType::Undefined => "UNDEFINED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert_eq!(
            ExprType::widest(ExprType::Integer, ExprType::Long),
            Some(ExprType::Long)
        );
        assert_eq!(
            ExprType::widest(ExprType::Long, ExprType::Float),
            Some(ExprType::Float)
        );
        assert_eq!(
            ExprType::widest(ExprType::Double, ExprType::Integer),
            Some(ExprType::Double)
        );
        assert_eq!(ExprType::widest(ExprType::Integer, ExprType::String), None);
    }

    #[test]
    fn test_compatibility() {
        assert!(ExprType::Integer.is_compatible(&ExprType::Double));
        assert!(ExprType::Undefined.is_compatible(&ExprType::String));
        assert!(ExprType::String.is_compatible(&ExprType::Undefined));
        assert!(!ExprType::String.is_compatible(&ExprType::Integer));
        assert!(!ExprType::Boolean.is_compatible(&ExprType::Date));
    }
}
