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

//! Query specification executor
//!
//! A [`QuerySpecification`] goes through reference resolution and three type
//! passes, then materializes its rows on every execution:
//!
//! ```text
//! JoinIterator (nested loop, outer join replay)
//!   ↓
//! WHERE filter
//!   ↓
//! grouping + aggregate folding
//!   ↓
//! HAVING → DISTINCT → ORDER BY → OFFSET/LIMIT
//!   ↓
//! MaterializedResult (visible zone)
//! ```
//!
//! # Components
//!
//! - [`QuerySpecification`] - builder, resolution passes and execution entry
//! - [`RangeVariable`] - FROM clause entry with its join type and condition
//! - [`QueryConfig`] - optimization switches and typing strictness
//! - [`ExecutionContext`] - parameters and cancellation
//! - [`MaterializedResult`] - result rows with column metadata

pub mod config;
pub mod context;
pub mod query_spec;
pub mod range;
pub mod result;

mod fast_path;
mod grouping;
mod join;
mod passes;
mod resolver;
mod updatable;

pub use config::QueryConfig;
pub use context::{CancellationHandle, ExecutionContext};
pub use query_spec::{OrderItem, QueryColumn, QuerySpecification, SortSpec, Zone, ZoneBounds};
pub use range::{JoinType, RangeVariable};
pub use result::MaterializedResult;
