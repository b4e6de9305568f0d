//! Tagged runtime values.
//!
//! `ExprValue` is the fundamental unit of data flowing through the engine.
//! NULL and MISSING are distinct: MISSING denotes a field absent from a
//! tuple, NULL a field present with no value. Values are immutable once
//! constructed.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::types::ExprType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single tagged runtime value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprValue {
    /// Field present with no value
    Null,
    /// Field absent from the tuple
    Missing,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit double precision
    Double(f64),
    /// String value
    String(String),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without zone
    Datetime(NaiveDateTime),
    /// Instant in time (UTC)
    Timestamp(DateTime<Utc>),
    /// One row: insertion-ordered mapping of field name to value
    Tuple(Vec<(String, ExprValue)>),
    /// Ordered sequence of values
    Array(Vec<ExprValue>),
}

impl ExprValue {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, ExprValue::Null)
    }

    /// Check if this value is MISSING
    pub fn is_missing(&self) -> bool {
        matches!(self, ExprValue::Missing)
    }

    /// NULL or MISSING, the absent values of three-valued logic
    pub fn is_absent(&self) -> bool {
        matches!(self, ExprValue::Null | ExprValue::Missing)
    }

    /// Get the static type tag of this value
    pub fn expr_type(&self) -> ExprType {
        match self {
            ExprValue::Null | ExprValue::Missing => ExprType::Undefined,
            ExprValue::Boolean(_) => ExprType::Boolean,
            ExprValue::Integer(_) => ExprType::Integer,
            ExprValue::Long(_) => ExprType::Long,
            ExprValue::Float(_) => ExprType::Float,
            ExprValue::Double(_) => ExprType::Double,
            ExprValue::String(_) => ExprType::String,
            ExprValue::Date(_) => ExprType::Date,
            ExprValue::Time(_) => ExprType::Time,
            ExprValue::Datetime(_) => ExprType::Datetime,
            ExprValue::Timestamp(_) => ExprType::Timestamp,
            ExprValue::Tuple(_) => ExprType::Tuple,
            ExprValue::Array(_) => ExprType::Array,
        }
    }

    /// Create a tuple value from name/value pairs
    pub fn tuple(fields: Vec<(String, ExprValue)>) -> Self {
        ExprValue::Tuple(fields)
    }

    /// Try to extract a boolean
    pub fn boolean_value(&self) -> PipeQueryResult<bool> {
        match self {
            ExprValue::Boolean(value) => Ok(*value),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract BOOLEAN from {}",
                self.expr_type()
            ))),
        }
    }

    /// Try to extract an i32
    pub fn integer_value(&self) -> PipeQueryResult<i32> {
        match self {
            ExprValue::Integer(value) => Ok(*value),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract INTEGER from {}",
                self.expr_type()
            ))),
        }
    }

    /// Try to extract an i64, widening from INTEGER
    pub fn long_value(&self) -> PipeQueryResult<i64> {
        match self {
            ExprValue::Long(value) => Ok(*value),
            ExprValue::Integer(value) => Ok(*value as i64),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract LONG from {}",
                self.expr_type()
            ))),
        }
    }

    /// Try to extract an f64, widening from any numeric type
    pub fn double_value(&self) -> PipeQueryResult<f64> {
        match self {
            ExprValue::Double(value) => Ok(*value),
            ExprValue::Float(value) => Ok(*value as f64),
            ExprValue::Long(value) => Ok(*value as f64),
            ExprValue::Integer(value) => Ok(*value as f64),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract DOUBLE from {}",
                self.expr_type()
            ))),
        }
    }

    /// Try to extract a string
    pub fn string_value(&self) -> PipeQueryResult<&str> {
        match self {
            ExprValue::String(value) => Ok(value),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract STRING from {}",
                self.expr_type()
            ))),
        }
    }

    /// Try to view this value as a tuple
    pub fn tuple_value(&self) -> PipeQueryResult<&[(String, ExprValue)]> {
        match self {
            ExprValue::Tuple(fields) => Ok(fields),
            _ => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot extract TUPLE from {}",
                self.expr_type()
            ))),
        }
    }

    /// Look up a field in a tuple value. Returns MISSING when the field is
    /// not present; fails when this value is not a tuple.
    pub fn tuple_get(&self, name: &str) -> PipeQueryResult<ExprValue> {
        let fields = self.tuple_value()?;
        Ok(fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
            .unwrap_or(ExprValue::Missing))
    }

    /// Compare two values for ordering.
    ///
    /// Total within compatible types with numeric widening; comparing across
    /// incompatible types fails with TypeMismatch. Absent values compare
    /// equal to each other and are handled by the sort comparator, not here:
    /// this method reports TypeMismatch when exactly one side is absent.
    pub fn compare(&self, other: &ExprValue) -> PipeQueryResult<Ordering> {
        match (self, other) {
            (a, b) if a.is_absent() && b.is_absent() => Ok(Ordering::Equal),
            (a, b) if a.is_absent() || b.is_absent() => Err(PipeQueryError::TypeMismatch(
                "Cannot order an absent value against a real value".to_string(),
            )),
            (ExprValue::Boolean(a), ExprValue::Boolean(b)) => Ok(a.cmp(b)),
            (ExprValue::String(a), ExprValue::String(b)) => Ok(a.cmp(b)),
            (ExprValue::Date(a), ExprValue::Date(b)) => Ok(a.cmp(b)),
            (ExprValue::Time(a), ExprValue::Time(b)) => Ok(a.cmp(b)),
            (ExprValue::Datetime(a), ExprValue::Datetime(b)) => Ok(a.cmp(b)),
            (ExprValue::Timestamp(a), ExprValue::Timestamp(b)) => Ok(a.cmp(b)),
            (ExprValue::Integer(a), ExprValue::Integer(b)) => Ok(a.cmp(b)),
            (ExprValue::Long(a), ExprValue::Long(b)) => Ok(a.cmp(b)),
            (a, b) if a.expr_type().is_numeric() && b.expr_type().is_numeric() => {
                match ExprType::widest(a.expr_type(), b.expr_type()) {
                    Some(ExprType::Long) => Ok(a.long_value()?.cmp(&b.long_value()?)),
                    Some(_) => {
                        let (x, y) = (a.double_value()?, b.double_value()?);
                        Ok(OrderedFloat(x).cmp(&OrderedFloat(y)))
                    }
                    None => unreachable!("both sides checked numeric"),
                }
            }
            (a, b) => Err(PipeQueryError::TypeMismatch(format!(
                "Cannot compare {} and {}",
                a.expr_type(),
                b.expr_type()
            ))),
        }
    }

    /// Render this value as JSON for external consumers. MISSING fields are
    /// omitted from tuples; a top-level MISSING renders as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ExprValue::Null | ExprValue::Missing => serde_json::Value::Null,
            ExprValue::Boolean(b) => serde_json::Value::Bool(*b),
            ExprValue::Integer(i) => serde_json::json!(i),
            ExprValue::Long(i) => serde_json::json!(i),
            ExprValue::Float(f) => serde_json::json!(f),
            ExprValue::Double(f) => serde_json::json!(f),
            ExprValue::String(s) => serde_json::Value::String(s.clone()),
            ExprValue::Date(d) => serde_json::Value::String(d.to_string()),
            ExprValue::Time(t) => serde_json::Value::String(t.to_string()),
            ExprValue::Datetime(dt) => serde_json::Value::String(dt.to_string()),
            ExprValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            ExprValue::Tuple(fields) => {
                let mut map = serde_json::Map::new();
                for (name, value) in fields {
                    if !value.is_missing() {
                        map.insert(name.clone(), value.to_json());
                    }
                }
                serde_json::Value::Object(map)
            }
            ExprValue::Array(values) => {
                serde_json::Value::Array(values.iter().map(|v| v.to_json()).collect())
            }
        }
    }
}

// Grouping, dedupe and rare/top-N key vectors with hash maps. Floats hash
// through OrderedFloat; NULL keys are equal to each other and distinct from
// any non-null key, MISSING likewise.
impl Eq for ExprValue {}

impl Hash for ExprValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ExprValue::Null | ExprValue::Missing => {}
            ExprValue::Boolean(b) => b.hash(state),
            ExprValue::Integer(i) => i.hash(state),
            ExprValue::Long(i) => i.hash(state),
            ExprValue::Float(f) => OrderedFloat(*f).hash(state),
            ExprValue::Double(f) => OrderedFloat(*f).hash(state),
            ExprValue::String(s) => s.hash(state),
            ExprValue::Date(d) => d.hash(state),
            ExprValue::Time(t) => t.hash(state),
            ExprValue::Datetime(dt) => dt.hash(state),
            ExprValue::Timestamp(ts) => ts.hash(state),
            ExprValue::Tuple(fields) => {
                for (name, value) in fields {
                    name.hash(state);
                    value.hash(state);
                }
            }
            ExprValue::Array(values) => {
                for value in values {
                    value.hash(state);
                }
            }
        }
    }
}

impl From<i32> for ExprValue {
    fn from(value: i32) -> Self {
        ExprValue::Integer(value)
    }
}

impl From<i64> for ExprValue {
    fn from(value: i64) -> Self {
        ExprValue::Long(value)
    }
}

impl From<f64> for ExprValue {
    fn from(value: f64) -> Self {
        ExprValue::Double(value)
    }
}

impl From<bool> for ExprValue {
    fn from(value: bool) -> Self {
        ExprValue::Boolean(value)
    }
}

impl From<&str> for ExprValue {
    fn from(value: &str) -> Self {
        ExprValue::String(value.to_string())
    }
}

impl From<String> for ExprValue {
    fn from(value: String) -> Self {
        ExprValue::String(value)
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Null => write!(f, "NULL"),
            ExprValue::Missing => write!(f, "MISSING"),
            ExprValue::Boolean(b) => write!(f, "{}", b),
            ExprValue::Integer(i) => write!(f, "{}", i),
            ExprValue::Long(i) => write!(f, "{}", i),
            ExprValue::Float(v) => write!(f, "{}", v),
            ExprValue::Double(v) => write!(f, "{}", v),
            ExprValue::String(s) => write!(f, "'{}'", s),
            ExprValue::Date(d) => write!(f, "DATE({})", d),
            ExprValue::Time(t) => write!(f, "TIME({})", t),
            ExprValue::Datetime(dt) => write!(f, "DATETIME({})", dt),
            ExprValue::Timestamp(ts) => write!(f, "TIMESTAMP({})", ts.to_rfc3339()),
            ExprValue::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            ExprValue::Tuple(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
