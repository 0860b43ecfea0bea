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

//! Utility scalar functions

use crate::core::{DataType, Result, Value};
use crate::functions::{FunctionInfo, FunctionSignature, ScalarFunction};

/// COALESCE function - first non-NULL argument
#[derive(Default)]
pub struct CoalesceFunction;

impl ScalarFunction for CoalesceFunction {
    fn name(&self) -> &str {
        "COALESCE"
    }

    fn info(&self) -> FunctionInfo {
        FunctionInfo::new(
            "COALESCE",
            "Returns the first non-NULL argument",
            FunctionSignature::variadic(1),
        )
    }

    fn return_type(&self, args: &[DataType]) -> Result<DataType> {
        args.iter()
            .try_fold(DataType::Null, |acc, t| acc.aggregate_type(*t))
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(Value::null_unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce() {
        let args = [Value::null_unknown(), Value::integer(2), Value::integer(3)];
        assert_eq!(CoalesceFunction.evaluate(&args).unwrap(), Value::integer(2));
        assert!(CoalesceFunction
            .evaluate(&[Value::null_unknown()])
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_coalesce_type() {
        assert_eq!(
            CoalesceFunction
                .return_type(&[DataType::Integer, DataType::Float])
                .unwrap(),
            DataType::Float
        );
        assert!(CoalesceFunction
            .return_type(&[DataType::Integer, DataType::Text])
            .is_err());
    }
}
