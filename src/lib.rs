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

//! # Stoolap Select - SQL query specification engine
//!
//! Resolution and execution of a single SQL `SELECT` block: column
//! references are bound to range variables (including correlated
//! references to enclosing queries), expressions are typed in three
//! passes, aggregates are hoisted into slots and grouped expressions are
//! validated, and execution runs a nested-loop join with outer join replay
//! followed by grouping, HAVING, DISTINCT, ORDER BY and OFFSET/LIMIT.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use stoolap_select::{
//!     row, DataType, ExecutionContext, Expression, MemoryTable, OrderItem, QuerySpecification,
//!     SchemaBuilder,
//! };
//!
//! let schema = SchemaBuilder::new("sales")
//!     .add_primary_key("id", DataType::Integer)
//!     .add("cat", DataType::Text)
//!     .add("amt", DataType::Integer)
//!     .build();
//! let sales = MemoryTable::with_rows(
//!     schema,
//!     vec![row![1, "A", 10], row![2, "B", 5], row![3, "A", 20]],
//! )
//! .unwrap();
//!
//! let mut query = QuerySpecification::new();
//! query
//!     .from_source(Arc::new(sales))
//!     .add_column(Expression::col("cat"))
//!     .add_select(Expression::sum(Expression::col("amt")), Some("total"))
//!     .add_group_by(Expression::col("cat"))
//!     .add_order_by(OrderItem::asc(Expression::col("cat")));
//! query.resolve().unwrap();
//!
//! let result = query.execute(&ExecutionContext::new(), 0).unwrap();
//! assert_eq!(result.rows(), &[row!["A", 30], row!["B", 5]]);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`DataType`], [`Value`], [`Row`], [`Schema`], [`Error`])
//! - [`expr`] - Expression trees, typing and evaluation
//! - [`functions`] - Scalar functions and aggregate accumulators
//! - [`storage`] - Range sources: in-memory tables and derived tables
//! - [`executor`] - Query specification resolution and execution

pub mod core;
pub mod executor;
pub mod expr;
pub mod functions;
pub mod storage;

// Re-export main types for convenience
pub use core::{DataType, Error, Operator, Result, Row, Schema, SchemaBuilder, SchemaColumn, Value};

pub use executor::{
    CancellationHandle, ExecutionContext, JoinType, MaterializedResult, OrderItem, QueryColumn,
    QueryConfig, QuerySpecification, RangeVariable, Zone, ZoneBounds,
};

pub use expr::{BinaryOp, ColumnRef, Expression, UnaryOp};

pub use functions::{global_registry, AggregateKind, ScalarFunction};

pub use storage::{DerivedTable, MemoryTable, RangeSource, ScanStats, Scanner, VecScanner};
