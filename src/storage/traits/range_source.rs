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

//! RangeSource trait for anything a query can range over

use crate::core::{Result, Schema};
use crate::executor::{ExecutionContext, QuerySpecification};
use crate::storage::traits::Scanner;

/// A table-like source of rows that a query specification ranges over
///
/// Implemented by base tables and by derived tables wrapping another query.
/// Sources are shared between queries through `Arc<dyn RangeSource>`.
pub trait RangeSource: Send + Sync {
    /// Returns the name used to qualify column references
    fn name(&self) -> &str;

    /// Returns the schema of the rows produced by `open`
    fn schema(&self) -> &Schema;

    /// Opens a new scanner over the source
    fn open(&self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner>>;

    /// Returns the cached row count if it is known without scanning
    fn row_count(&self) -> Option<usize> {
        None
    }

    /// Returns the name of a unique index covering exactly `columns`
    ///
    /// Column order is irrelevant. Only indexes over NOT NULL columns qualify,
    /// since NULLs compare equal under DISTINCT but not under uniqueness.
    fn find_unique_index(&self, columns: &[usize]) -> Option<String> {
        let mut wanted = columns.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        self.schema()
            .unique_not_null_keys()
            .into_iter()
            .find(|key| {
                let mut key = key.clone();
                key.sort_unstable();
                key == wanted
            })
            .map(|key| {
                let names: Vec<&str> = key
                    .iter()
                    .filter_map(|&i| self.schema().get_column(i))
                    .map(|c| c.name.as_str())
                    .collect();
                format!("{}_unique_{}", self.name(), names.join("_"))
            })
    }

    /// True if rows of this source can be updated through a query over it
    fn is_updatable(&self) -> bool {
        false
    }

    /// True if rows can be inserted through a query over this source
    fn is_insertable(&self) -> bool {
        false
    }

    /// Maps each column of this source to a column of the base table
    ///
    /// `None` marks a column with no base counterpart.
    fn base_column_map(&self) -> Vec<Option<usize>> {
        vec![None; self.schema().column_count()]
    }

    /// Returns the schema of the underlying base table, if any
    fn base_schema(&self) -> Option<&Schema> {
        None
    }

    /// Returns the query this source wraps, for derived tables
    fn as_query(&self) -> Option<&QuerySpecification> {
        None
    }
}
