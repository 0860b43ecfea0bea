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

//! Math scalar functions

use crate::core::{DataType, Error, Result, Value};
use crate::functions::{FunctionInfo, FunctionSignature, ScalarFunction};

/// ABS function - absolute value of a number
#[derive(Default)]
pub struct AbsFunction;

impl ScalarFunction for AbsFunction {
    fn name(&self) -> &str {
        "ABS"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "ABS",
            "Returns the absolute value of a number",
            FunctionSignature::new(1, 1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        match args[0] {
            DataType::Null => Ok(DataType::Integer),
            t if t.is_numeric() => Ok(t),
            other => Err(Error::type_mismatch("ABS", format!("argument type {}", other))),
        }
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        match &args[0] {
            Value::Null(t) => Ok(Value::Null(*t)),
            Value::Integer(i) => i.checked_abs().map(Value::Integer).ok_or(Error::NumericOverflow),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(Error::type_mismatch("ABS", format!("value {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs() {
        assert_eq!(
            AbsFunction.evaluate(&[Value::integer(-3)]).unwrap(),
            Value::integer(3)
        );
        assert_eq!(
            AbsFunction.evaluate(&[Value::float(-1.5)]).unwrap(),
            Value::float(1.5)
        );
        assert_eq!(
            AbsFunction.evaluate(&[Value::integer(i64::MIN)]).unwrap_err(),
            Error::NumericOverflow
        );
    }
}
