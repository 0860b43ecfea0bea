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

//! Scalar Functions
//!
//! ## String Functions
//! - [`UpperFunction`] - UPPER(string)
//! - [`LowerFunction`] - LOWER(string)
//! - [`LengthFunction`] - LENGTH(string)
//!
//! ## Math Functions
//! - [`AbsFunction`] - ABS(number)
//!
//! ## Utility Functions
//! - [`CoalesceFunction`] - COALESCE(value, ...)

mod math;
mod string;
mod utility;

pub use math::AbsFunction;
pub use string::{LengthFunction, LowerFunction, UpperFunction};
pub use utility::CoalesceFunction;

use crate::core::{DataType, Error, Result, Value};

/// Convert a Value to a string representation
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Text(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Require a text-compatible argument type
pub(crate) fn expect_text(name: &str, arg: DataType) -> Result<()> {
    match arg {
        DataType::Text | DataType::Null => Ok(()),
        other => Err(Error::type_mismatch(name, format!("argument type {}", other))),
    }
}
