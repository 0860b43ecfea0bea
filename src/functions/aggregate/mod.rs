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

//! Aggregate Functions
//!
//! The aggregate set is closed: [`AggregateKind`] names the function and
//! [`Accumulator`] carries its running state for one group. Accumulation is
//! a pure step `(state, value) -> state`; the materializer owns one
//! accumulator per aggregate slot per group.
//!
//! - COUNT(*) and COUNT(column)
//! - SUM(column), AVG(column)
//! - MIN(column), MAX(column)
//! - EVERY(boolean), SOME(boolean)

use std::fmt;

use rustc_hash::FxHashSet;

use crate::core::{DataType, Error, Result, Value};

/// Aggregate function kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Every,
    Some,
}

impl AggregateKind {
    /// SQL name of the aggregate
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Count => "COUNT",
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
            AggregateKind::Every => "EVERY",
            AggregateKind::Some => "SOME",
        }
    }

    /// Look up an aggregate by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateKind::Count),
            "SUM" => Some(AggregateKind::Sum),
            "AVG" => Some(AggregateKind::Avg),
            "MIN" => Some(AggregateKind::Min),
            "MAX" => Some(AggregateKind::Max),
            "EVERY" | "BOOL_AND" => Some(AggregateKind::Every),
            "SOME" | "ANY" | "BOOL_OR" => Some(AggregateKind::Some),
            _ => None,
        }
    }

    /// Result type for an argument of type `arg`
    ///
    /// `arg` is `None` for COUNT(*).
    pub fn result_type(&self, arg: Option<DataType>) -> Result<DataType> {
        let arg = match (self, arg) {
            (AggregateKind::Count, _) => return Ok(DataType::Integer),
            (_, None) => {
                return Err(Error::invalid_argument(format!(
                    "{} requires an argument",
                    self.name()
                )))
            }
            (_, Some(t)) => t,
        };
        match self {
            AggregateKind::Sum if arg.is_numeric() || arg.is_unknown() => Ok(
                if arg.is_unknown() {
                    DataType::Integer
                } else {
                    arg
                },
            ),
            AggregateKind::Avg if arg.is_numeric() || arg.is_unknown() => Ok(DataType::Float),
            AggregateKind::Min | AggregateKind::Max if arg.is_orderable() => Ok(arg),
            AggregateKind::Every | AggregateKind::Some
                if matches!(arg, DataType::Boolean | DataType::Null) =>
            {
                Ok(DataType::Boolean)
            }
            _ => Err(Error::type_mismatch(self.name(), format!("argument type {}", arg))),
        }
    }

    /// True for the aggregates the MIN/MAX rewrite applies to
    pub fn is_min_max(&self) -> bool {
        matches!(self, AggregateKind::Min | AggregateKind::Max)
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sum state - tracks whether we have integers or floats
#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum SumState {
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
}

impl SumState {
    fn add(self, value: &Value) -> Result<Self> {
        Ok(match (self, value) {
            (SumState::Empty, Value::Integer(i)) => SumState::Integer(*i),
            (SumState::Empty, Value::Float(f)) => SumState::Float(*f),
            (SumState::Integer(s), Value::Integer(i)) => {
                SumState::Integer(s.checked_add(*i).ok_or(Error::NumericOverflow)?)
            }
            (SumState::Integer(s), Value::Float(f)) => SumState::Float(s as f64 + f),
            (SumState::Float(s), Value::Integer(i)) => SumState::Float(s + *i as f64),
            (SumState::Float(s), Value::Float(f)) => SumState::Float(s + f),
            (_, other) => {
                return Err(Error::type_mismatch(
                    "SUM",
                    format!("non-numeric value {}", other),
                ))
            }
        })
    }

    fn count_as_float(self) -> Option<f64> {
        match self {
            SumState::Empty => None,
            SumState::Integer(i) => Some(i as f64),
            SumState::Float(f) => Some(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AccState {
    Count(i64),
    Sum(SumState),
    Avg { sum: SumState, count: i64 },
    Extreme(Option<Value>),
    Logical(Option<bool>),
}

/// Running state of one aggregate for one group
#[derive(Debug, Clone)]
pub struct Accumulator {
    kind: AggregateKind,
    count_star: bool,
    seen: Option<FxHashSet<Value>>,
    state: AccState,
}

/// An empty COUNT, used as the placeholder while a state is being folded
impl Default for Accumulator {
    fn default() -> Self {
        Self::new(AggregateKind::Count, false, false)
    }
}

impl Accumulator {
    /// Create an empty accumulator
    ///
    /// `count_star` marks COUNT(*), which counts rows including NULLs.
    pub fn new(kind: AggregateKind, distinct: bool, count_star: bool) -> Self {
        let state = match kind {
            AggregateKind::Count => AccState::Count(0),
            AggregateKind::Sum => AccState::Sum(SumState::Empty),
            AggregateKind::Avg => AccState::Avg {
                sum: SumState::Empty,
                count: 0,
            },
            AggregateKind::Min | AggregateKind::Max => AccState::Extreme(None),
            AggregateKind::Every | AggregateKind::Some => AccState::Logical(None),
        };
        Self {
            kind,
            count_star,
            seen: if distinct { Some(FxHashSet::default()) } else { None },
            state,
        }
    }

    /// The aggregate this accumulator computes
    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    /// Fold one input value into the state
    pub fn merge(mut self, value: &Value) -> Result<Self> {
        if self.count_star {
            if let AccState::Count(n) = self.state {
                self.state = AccState::Count(n + 1);
            }
            return Ok(self);
        }
        // NULL inputs never contribute
        if value.is_null() {
            return Ok(self);
        }
        if let Some(seen) = self.seen.as_mut() {
            if !seen.insert(value.clone()) {
                return Ok(self);
            }
        }
        self.state = match self.state {
            AccState::Count(n) => AccState::Count(n + 1),
            AccState::Sum(sum) => AccState::Sum(sum.add(value)?),
            AccState::Avg { sum, count } => AccState::Avg {
                sum: sum.add(value)?,
                count: count + 1,
            },
            AccState::Extreme(current) => {
                let keep_new = match &current {
                    None => true,
                    Some(cur) => {
                        let ord = value.compare(cur)?;
                        match self.kind {
                            AggregateKind::Min => ord.is_lt(),
                            _ => ord.is_gt(),
                        }
                    }
                };
                AccState::Extreme(if keep_new { Some(value.clone()) } else { current })
            }
            AccState::Logical(current) => {
                let b = value.as_boolean().ok_or_else(|| {
                    Error::type_mismatch(self.kind.name(), format!("non-boolean value {}", value))
                })?;
                AccState::Logical(Some(match (self.kind, current) {
                    (_, None) => b,
                    (AggregateKind::Every, Some(c)) => c && b,
                    (_, Some(c)) => c || b,
                }))
            }
        };
        Ok(self)
    }

    /// Final value of the aggregate
    ///
    /// An aggregate over no values is a NULL of `result_type`.
    pub fn finish(&self, result_type: DataType) -> Value {
        match &self.state {
            AccState::Count(n) => Value::Integer(*n),
            AccState::Sum(SumState::Empty) => Value::null(result_type),
            AccState::Sum(SumState::Integer(s)) => Value::Integer(*s),
            AccState::Sum(SumState::Float(s)) => Value::Float(*s),
            AccState::Avg { sum, count } => match sum.count_as_float() {
                Some(total) if *count > 0 => Value::Float(total / *count as f64),
                _ => Value::null(DataType::Float),
            },
            AccState::Extreme(v) => v.clone().unwrap_or(Value::null(result_type)),
            AccState::Logical(b) => match b {
                Some(b) => Value::Boolean(*b),
                None => Value::null(DataType::Boolean),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: AggregateKind, distinct: bool, values: &[Value]) -> Value {
        let mut acc = Accumulator::new(kind, distinct, false);
        for v in values {
            acc = acc.merge(v).unwrap();
        }
        acc.finish(DataType::Integer)
    }

    #[test]
    fn test_count_star_counts_nulls() {
        let mut acc = Accumulator::new(AggregateKind::Count, false, true);
        for v in [Value::integer(1), Value::null_unknown()] {
            acc = acc.merge(&v).unwrap();
        }
        assert_eq!(acc.finish(DataType::Integer), Value::integer(2));
        assert_eq!(
            run(
                AggregateKind::Count,
                false,
                &[Value::integer(1), Value::null_unknown()]
            ),
            Value::integer(1)
        );
    }

    #[test]
    fn test_sum_integers_and_mixed() {
        let ints = [Value::integer(1), Value::integer(2), Value::integer(3)];
        assert_eq!(run(AggregateKind::Sum, false, &ints), Value::integer(6));
        let mixed = [Value::integer(1), Value::float(2.5)];
        assert_eq!(run(AggregateKind::Sum, false, &mixed), Value::float(3.5));
        assert!(run(AggregateKind::Sum, false, &[]).is_null());
    }

    #[test]
    fn test_sum_overflow() {
        let acc = Accumulator::new(AggregateKind::Sum, false, false)
            .merge(&Value::integer(i64::MAX))
            .unwrap();
        assert_eq!(
            acc.merge(&Value::integer(1)).unwrap_err(),
            Error::NumericOverflow
        );
    }

    #[test]
    fn test_distinct() {
        let values = [
            Value::integer(1),
            Value::integer(1),
            Value::integer(2),
            Value::null_unknown(),
        ];
        assert_eq!(run(AggregateKind::Sum, true, &values), Value::integer(3));
        assert_eq!(run(AggregateKind::Count, true, &values), Value::integer(2));
    }

    #[test]
    fn test_avg_min_max() {
        let values = [Value::integer(4), Value::integer(1), Value::integer(7)];
        assert_eq!(run(AggregateKind::Avg, false, &values), Value::float(4.0));
        assert_eq!(run(AggregateKind::Min, false, &values), Value::integer(1));
        assert_eq!(run(AggregateKind::Max, false, &values), Value::integer(7));
        assert!(run(AggregateKind::Max, false, &[]).is_null());
    }

    #[test]
    fn test_empty_results_carry_type() {
        let max = Accumulator::new(AggregateKind::Max, false, false);
        assert_eq!(max.finish(DataType::Text).data_type(), DataType::Text);
        let sum = Accumulator::new(AggregateKind::Sum, false, false);
        assert_eq!(sum.finish(DataType::Float).data_type(), DataType::Float);
    }

    #[test]
    fn test_every_some() {
        let values = [Value::boolean(true), Value::boolean(false)];
        assert_eq!(run(AggregateKind::Every, false, &values), Value::boolean(false));
        assert_eq!(run(AggregateKind::Some, false, &values), Value::boolean(true));
        assert!(run(AggregateKind::Every, false, &[]).is_null());
    }

    #[test]
    fn test_result_types() {
        assert_eq!(
            AggregateKind::Count.result_type(None).unwrap(),
            DataType::Integer
        );
        assert_eq!(
            AggregateKind::Avg.result_type(Some(DataType::Integer)).unwrap(),
            DataType::Float
        );
        assert_eq!(
            AggregateKind::Max.result_type(Some(DataType::Text)).unwrap(),
            DataType::Text
        );
        assert!(AggregateKind::Sum.result_type(Some(DataType::Text)).is_err());
        assert!(AggregateKind::Every
            .result_type(Some(DataType::Integer))
            .is_err());
        assert_eq!(AggregateKind::from_name("bool_or"), Some(AggregateKind::Some));
    }
}
