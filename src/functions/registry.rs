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

//! Function Registry
//!
//! Name lookup for scalar functions. Built-ins are registered on first use;
//! embedders add their own with [`FunctionRegistry::register`].

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::aggregate::AggregateKind;
use super::scalar::{AbsFunction, CoalesceFunction, LengthFunction, LowerFunction, UpperFunction};
use super::{FunctionInfo, ScalarFunction};

/// Global function registry instance
static GLOBAL_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// Get the global function registry
#[inline]
pub fn global_registry() -> &'static FunctionRegistry {
    GLOBAL_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Function registry for scalar functions
pub struct FunctionRegistry {
    scalar_functions: RwLock<FxHashMap<String, Arc<dyn ScalarFunction>>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions registered
    pub fn new() -> Self {
        let registry = Self {
            scalar_functions: RwLock::new(FxHashMap::default()),
        };

        registry.register_scalar::<UpperFunction>();
        registry.register_scalar::<LowerFunction>();
        registry.register_scalar::<LengthFunction>();
        registry.register_scalar::<AbsFunction>();
        registry.register_scalar::<CoalesceFunction>();

        registry
    }

    /// Register a built-in scalar function
    pub fn register_scalar<F: ScalarFunction + Default + 'static>(&self) {
        self.register(Arc::new(F::default()));
    }

    /// Register a scalar function instance, replacing any function of the
    /// same name
    pub fn register(&self, function: Arc<dyn ScalarFunction>) {
        let name = function.name().to_uppercase();
        self.scalar_functions.write().insert(name, function);
    }

    /// Get a scalar function by name (case-insensitive)
    pub fn get_scalar(&self, name: &str) -> Option<Arc<dyn ScalarFunction>> {
        let funcs = self.scalar_functions.read();
        if let Some(f) = funcs.get(name) {
            return Some(Arc::clone(f));
        }
        funcs.get(&name.to_uppercase()).cloned()
    }

    /// Check if a function name is an aggregate function
    pub fn is_aggregate(&self, name: &str) -> bool {
        AggregateKind::from_name(name).is_some()
    }

    /// Check if a function name is a scalar function
    pub fn is_scalar(&self, name: &str) -> bool {
        self.get_scalar(name).is_some()
    }

    /// Get function info by name
    pub fn get_info(&self, name: &str) -> Option<FunctionInfo> {
        self.get_scalar(name).map(|f| f.info())
    }

    /// List all scalar function names
    pub fn list_scalars(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scalar_functions.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Result, Value};

    struct Twice;

    impl ScalarFunction for Twice {
        fn name(&self) -> &str {
            "twice"
        }

        fn info(&self) -> FunctionInfo {
            FunctionInfo::new("TWICE", "Doubles", super::super::FunctionSignature::new(1, 1))
        }

        fn return_type(&self, _args: &[DataType]) -> Result<DataType> {
            Ok(DataType::Integer)
        }

        fn evaluate(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::integer(args[0].as_int64().unwrap_or(0) * 2))
        }
    }

    #[test]
    fn test_builtin_lookup() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_scalar("upper"));
        assert!(registry.is_scalar("COALESCE"));
        assert!(!registry.is_scalar("SUM"));
        assert!(registry.is_aggregate("sum"));
        assert_eq!(
            registry.list_scalars(),
            vec!["ABS", "COALESCE", "LENGTH", "LOWER", "UPPER"]
        );
    }

    #[test]
    fn test_register_custom() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(Twice));
        let f = registry.get_scalar("Twice").unwrap();
        assert_eq!(f.evaluate(&[Value::integer(4)]).unwrap(), Value::integer(8));
        assert_eq!(registry.get_info("TWICE").unwrap().name, "TWICE");
    }
}
