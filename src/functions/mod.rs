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

//! SQL Function System
//!
//! - [`ScalarFunction`] - per-row functions (UPPER, LOWER, ABS, ...) looked
//!   up by name through the [`FunctionRegistry`]
//! - [`AggregateKind`] / [`Accumulator`] - the closed set of aggregate
//!   functions and their running state

pub mod aggregate;
pub mod registry;
pub mod scalar;

use crate::core::{DataType, Error, Result, Value};

/// Function signature information
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments
    pub max_args: usize,
}

impl FunctionSignature {
    /// Create a new function signature
    pub fn new(min_args: usize, max_args: usize) -> Self {
        Self { min_args, max_args }
    }

    /// Create a variadic function signature
    pub fn variadic(min_args: usize) -> Self {
        Self {
            min_args,
            max_args: usize::MAX,
        }
    }

    /// Validate argument count
    pub fn validate_arg_count(&self, name: &str, count: usize) -> Result<()> {
        if count < self.min_args {
            return Err(Error::invalid_argument(format!(
                "{} expects at least {} arguments, got {}",
                name, self.min_args, count
            )));
        }
        if count > self.max_args {
            return Err(Error::invalid_argument(format!(
                "{} expects at most {} arguments, got {}",
                name, self.max_args, count
            )));
        }
        Ok(())
    }
}

/// Function information
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Function name
    pub name: String,
    /// Description
    pub description: String,
    /// Signature
    pub signature: FunctionSignature,
}

impl FunctionInfo {
    /// Create a new function info
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        signature: FunctionSignature,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            signature,
        }
    }
}

/// Trait for scalar functions
///
/// A scalar function is a pure function of its argument values.
pub trait ScalarFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get function information
    fn info(&self) -> FunctionInfo;

    /// Result type for the given argument types
    fn return_type(&self, args: &[DataType]) -> Result<DataType>;

    /// Evaluate the function with the given arguments
    fn evaluate(&self, args: &[Value]) -> Result<Value>;
}

pub use aggregate::{Accumulator, AggregateKind};
pub use registry::{global_registry, FunctionRegistry};
pub use scalar::{AbsFunction, CoalesceFunction, LengthFunction, LowerFunction, UpperFunction};
