// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Value type - runtime values with type information
//!
//! [`Value`] doubles as the type service of the engine: ordering through
//! [`Value::compare`] and conversion through [`Value::convert_to`].
//! `PartialEq`/`Hash` treat NULL as equal to NULL so values can key group
//! and DISTINCT maps.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::error::{Error, Result};
use super::types::DataType;

/// Timestamp formats supported for parsing
/// Order matters - more specific formats first
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z", // RFC3339 with fractional seconds
    "%Y-%m-%dT%H:%M:%S%:z",    // RFC3339
    "%Y-%m-%dT%H:%M:%SZ",      // RFC3339 UTC
    "%Y-%m-%dT%H:%M:%S",       // ISO without timezone
    "%Y-%m-%d %H:%M:%S%.f",    // SQL-style with fractional seconds
    "%Y-%m-%d %H:%M:%S",       // SQL-style
];

/// A runtime value with type information
///
/// Text and arrays use `Arc` so rows clone cheaply while they move through
/// the join, grouping and sort stages.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value with a type hint
    Null(DataType),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text string
    Text(Arc<str>),

    /// Boolean value
    Boolean(bool),

    /// Timestamp (UTC)
    Timestamp(DateTime<Utc>),

    /// Array of values
    Array(Arc<[Value]>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a NULL value with a type hint
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    /// Create a NULL value with unknown type
    pub fn null_unknown() -> Self {
        Value::Null(DataType::Null)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    /// Create a float value
    pub fn float(value: f64) -> Self {
        Value::Float(value)
    }

    /// Create a text value
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(Arc::from(value.into().as_str()))
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create a timestamp value
    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }

    /// Create an array value
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Arc::from(values))
    }

    // =========================================================================
    // Type accessors
    // =========================================================================

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(dt) => *dt,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Array(_) => DataType::Array,
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Integer view, widening nothing
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view of any numeric value
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrowed text view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true only for a boolean TRUE
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Compare two non-null values for ordering
    ///
    /// Two NULLs compare equal. A NULL against a non-null value, or two
    /// values of unrelated types, is an error; callers decide NULL placement.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null(_), Value::Null(_)) => Ok(Ordering::Equal),
            (Value::Null(_), _) | (_, Value::Null(_)) => Err(Error::expression_evaluation(
                "cannot compare NULL with non-NULL value",
            )),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_floats(*a, *b)),
            (Value::Integer(a), Value::Float(b)) => Ok(compare_floats(*a as f64, *b)),
            (Value::Float(a), Value::Integer(b)) => Ok(compare_floats(*a, *b as f64)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if x.is_null() || y.is_null() {
                        let ord = x.is_null().cmp(&y.is_null()).reverse();
                        if ord != Ordering::Equal {
                            return Ok(ord);
                        }
                        continue;
                    }
                    let ord = x.compare(y)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(Error::incompatible_types(self.data_type(), other.data_type())),
        }
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Convert this value to the target type
    pub fn convert_to(&self, target: DataType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null(target));
        }
        if target == DataType::Null || self.data_type() == target {
            return Ok(self.clone());
        }
        let fail = || Error::type_conversion(self.to_string(), target.to_string());
        match (self, target) {
            (Value::Integer(v), DataType::Float) => Ok(Value::Float(*v as f64)),
            (Value::Float(v), DataType::Integer) => {
                let t = v.trunc();
                if !t.is_finite() || t < i64::MIN as f64 || t > i64::MAX as f64 {
                    return Err(Error::NumericOverflow);
                }
                Ok(Value::Integer(t as i64))
            }
            (Value::Boolean(b), DataType::Integer) => Ok(Value::Integer(i64::from(*b))),
            (v, DataType::Text) => Ok(Value::text(v.to_string())),
            (Value::Text(s), DataType::Integer) => {
                s.trim().parse::<i64>().map(Value::Integer).map_err(|_| fail())
            }
            (Value::Text(s), DataType::Float) => {
                s.trim().parse::<f64>().map(Value::Float).map_err(|_| fail())
            }
            (Value::Text(s), DataType::Boolean) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
            (Value::Text(s), DataType::Timestamp) => {
                parse_timestamp(s).map(Value::Timestamp).map_err(|_| fail())
            }
            _ => Err(fail()),
        }
    }
}

// =========================================================================
// Trait implementations
// =========================================================================

impl Default for Value {
    fn default() -> Self {
        Value::Null(DataType::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::Array(items) => {
                write!(f, "ARRAY[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Grouping semantics: NULL matches NULL
            (Value::Null(_), Value::Null(_)) => true,
            (Value::Null(_), _) | (_, Value::Null(_)) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                *f == (*i as f64)
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Integer(5) == Float(5.0), so both hash as f64 bits
        match self {
            Value::Null(_) => 0u8.hash(state),
            Value::Integer(v) => {
                1u8.hash(state);
                (*v as f64).to_bits().hash(state);
            }
            Value::Float(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Value::Timestamp(t) => {
                4u8.hash(state);
                t.timestamp_nanos_opt().hash(state);
            }
            Value::Array(items) => {
                5u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null(DataType::Null),
        }
    }
}

// =========================================================================
// Helper functions
// =========================================================================

/// Parse a timestamp string with multiple format support
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    Err(Error::type_conversion(s, "TIMESTAMP"))
}

/// Format a float value consistently
fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        let s = format!("{:?}", v);
        if s.contains('.') && !s.contains('e') && !s.contains('E') {
            s.trim_end_matches('0').to_string()
        } else {
            s
        }
    }
}

/// Compare two floats, NaN sorts last
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_constructors_and_types() {
        assert_eq!(Value::integer(3).data_type(), DataType::Integer);
        assert_eq!(Value::text("a").data_type(), DataType::Text);
        assert_eq!(Value::null(DataType::Float).data_type(), DataType::Float);
        assert!(Value::null_unknown().is_null());
        assert!(Value::boolean(true).is_true());
        assert!(!Value::null(DataType::Boolean).is_true());
    }

    #[test]
    fn test_compare_numeric_cross_type() {
        assert_eq!(
            Value::integer(2).compare(&Value::float(2.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::float(3.0).compare(&Value::integer(3)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_errors() {
        assert!(Value::integer(1).compare(&Value::null_unknown()).is_err());
        assert!(Value::integer(1).compare(&Value::text("1")).is_err());
        assert_eq!(
            Value::null_unknown()
                .compare(&Value::null(DataType::Text))
                .unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_grouping_equality_and_hash() {
        assert_eq!(Value::null(DataType::Integer), Value::null(DataType::Text));
        assert_eq!(Value::integer(5), Value::float(5.0));
        assert_eq!(hash_of(&Value::integer(5)), hash_of(&Value::float(5.0)));
        assert_ne!(Value::integer(5), Value::text("5"));
    }

    #[test]
    fn test_convert_to() {
        assert_eq!(
            Value::integer(7).convert_to(DataType::Float).unwrap(),
            Value::float(7.0)
        );
        assert_eq!(
            Value::text(" 42 ").convert_to(DataType::Integer).unwrap(),
            Value::integer(42)
        );
        assert_eq!(
            Value::float(1.5).convert_to(DataType::Text).unwrap(),
            Value::text("1.5")
        );
        assert!(Value::text("abc").convert_to(DataType::Integer).is_err());
        assert!(Value::null_unknown()
            .convert_to(DataType::Integer)
            .unwrap()
            .is_null());
        let ts = Value::text("2024-03-01")
            .convert_to(DataType::Timestamp)
            .unwrap();
        match ts {
            Value::Timestamp(t) => assert_eq!(t.month(), 3),
            other => panic!("expected timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::float(2.0).to_string(), "2.0");
        assert_eq!(Value::float(0.25).to_string(), "0.25");
        assert_eq!(Value::boolean(false).to_string(), "FALSE");
        assert_eq!(
            Value::array(vec![Value::integer(1), Value::null_unknown()]).to_string(),
            "ARRAY[1, NULL]"
        );
    }
}
