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

//! Derived tables: a named query used as a range source

use std::sync::Arc;

use crate::core::{Result, Schema};
use crate::executor::{ExecutionContext, QuerySpecification};
use crate::storage::traits::{RangeSource, Scanner, VecScanner};

/// A resolved query exposed as a table, as for views and FROM subqueries
///
/// The query is materialized each time a scanner is opened. An enclosing
/// query may instead merge with it (see `QueryConfig::merge_derived_tables`).
#[derive(Debug)]
pub struct DerivedTable {
    name: String,
    query: Arc<QuerySpecification>,
    schema: Schema,
}

impl DerivedTable {
    /// Resolves `query` and wraps it under `name`
    pub fn new(name: impl Into<String>, mut query: QuerySpecification) -> Result<Self> {
        let name = name.into();
        if !query.is_resolved() {
            query.resolve()?;
        }
        let schema = query.result_schema(&name);
        log::debug!("derived table {} -> {}", name, schema);
        Ok(Self {
            name,
            query: Arc::new(query),
            schema,
        })
    }

    /// The wrapped query
    pub fn query(&self) -> &QuerySpecification {
        &self.query
    }
}

impl RangeSource for DerivedTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner>> {
        let result = self.query.execute(ctx, 0)?;
        Ok(Box::new(VecScanner::new(result.into_rows())))
    }

    fn find_unique_index(&self, _columns: &[usize]) -> Option<String> {
        None
    }

    fn is_updatable(&self) -> bool {
        self.query.is_updatable()
    }

    fn is_insertable(&self) -> bool {
        self.query.is_insertable()
    }

    fn base_column_map(&self) -> Vec<Option<usize>> {
        let map = self.query.base_table_column_map();
        (0..self.schema.column_count())
            .map(|i| map.get(i).copied().flatten())
            .collect()
    }

    fn base_schema(&self) -> Option<&Schema> {
        if self.query.is_updatable() {
            self.query.base_schema()
        } else {
            None
        }
    }

    fn as_query(&self) -> Option<&QuerySpecification> {
        Some(&self.query)
    }
}
