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

//! String scalar functions

use std::sync::Arc;

use crate::core::{DataType, Result, Value};
use crate::functions::{FunctionInfo, FunctionSignature, ScalarFunction};

use super::{expect_text, value_to_string};

// ============================================================================
// UPPER
// ============================================================================

/// UPPER function - converts a string to uppercase
#[derive(Default)]
pub struct UpperFunction;

impl ScalarFunction for UpperFunction {
    fn name(&self) -> &str {
        "UPPER"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "UPPER",
            "Converts a string to uppercase",
            FunctionSignature::new(1, 1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        expect_text("UPPER", args[0])?;
        Ok(DataType::Text)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        if args[0].is_null() {
            return Ok(Value::null(DataType::Text));
        }
        let s = value_to_string(&args[0]);
        Ok(Value::Text(Arc::from(s.to_uppercase().as_str())))
    }
}

// ============================================================================
// LOWER
// ============================================================================

/// LOWER function - converts a string to lowercase
#[derive(Default)]
pub struct LowerFunction;

impl ScalarFunction for LowerFunction {
    fn name(&self) -> &str {
        "LOWER"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "LOWER",
            "Converts a string to lowercase",
            FunctionSignature::new(1, 1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        expect_text("LOWER", args[0])?;
        Ok(DataType::Text)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        if args[0].is_null() {
            return Ok(Value::null(DataType::Text));
        }
        let s = value_to_string(&args[0]);
        Ok(Value::Text(Arc::from(s.to_lowercase().as_str())))
    }
}

// ============================================================================
// LENGTH
// ============================================================================

/// LENGTH function - number of characters in a string
#[derive(Default)]
pub struct LengthFunction;

impl ScalarFunction for LengthFunction {
    fn name(&self) -> &str {
        "LENGTH"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "LENGTH",
            "Returns the length of a string",
            FunctionSignature::new(1, 1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        expect_text("LENGTH", args[0])?;
        Ok(DataType::Integer)
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        if args[0].is_null() {
            return Ok(Value::null(DataType::Integer));
        }
        let s = value_to_string(&args[0]);
        Ok(Value::Integer(s.chars().count() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_lower() {
        assert_eq!(
            UpperFunction.evaluate(&[Value::text("abc")]).unwrap(),
            Value::text("ABC")
        );
        assert_eq!(
            LowerFunction.evaluate(&[Value::text("AbC")]).unwrap(),
            Value::text("abc")
        );
        assert!(UpperFunction
            .evaluate(&[Value::null_unknown()])
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_length_counts_chars() {
        assert_eq!(
            LengthFunction.evaluate(&[Value::text("héllo")]).unwrap(),
            Value::integer(5)
        );
        assert!(LengthFunction.return_type(&[DataType::Integer]).is_err());
    }
}
