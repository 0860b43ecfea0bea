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

//! In-memory base table

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::core::{Error, Result, Row, Schema, Value};
use crate::executor::ExecutionContext;
use crate::storage::traits::{RangeSource, Scanner, VecScanner};

type UniqueKey = SmallVec<[Value; 4]>;

/// Access counters for a [`MemoryTable`]
#[derive(Debug, Default)]
pub struct ScanStats {
    opens: AtomicUsize,
    next_calls: AtomicUsize,
    count_lookups: AtomicUsize,
}

impl ScanStats {
    /// Number of scanners opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Number of `next()` calls across all scanners
    pub fn next_calls(&self) -> usize {
        self.next_calls.load(Ordering::Relaxed)
    }

    /// Number of cached row count lookups
    pub fn count_lookups(&self) -> usize {
        self.count_lookups.load(Ordering::Relaxed)
    }

    /// Resets all counters to zero
    pub fn reset(&self) {
        self.opens.store(0, Ordering::Relaxed);
        self.next_calls.store(0, Ordering::Relaxed);
        self.count_lookups.store(0, Ordering::Relaxed);
    }
}

struct TableData {
    // Scanners hold a clone of the Arc, so inserts never disturb open scans
    rows: Arc<Vec<Row>>,
    unique: Vec<FxHashSet<UniqueKey>>,
}

/// A base table held entirely in memory
///
/// Unique keys declared on the schema are enforced on insert. Every opened
/// scanner sees a snapshot of the rows at the time it was opened.
pub struct MemoryTable {
    schema: Schema,
    data: RwLock<TableData>,
    stats: Arc<ScanStats>,
}

impl MemoryTable {
    /// Creates an empty table
    pub fn new(schema: Schema) -> Self {
        let unique = vec![FxHashSet::default(); schema.unique_keys.len()];
        Self {
            schema,
            data: RwLock::new(TableData {
                rows: Arc::new(Vec::new()),
                unique,
            }),
            stats: Arc::new(ScanStats::default()),
        }
    }

    /// Creates a table and inserts the given rows
    pub fn with_rows(schema: Schema, rows: impl IntoIterator<Item = Row>) -> Result<Self> {
        let table = Self::new(schema);
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    /// Validates and appends a row
    pub fn insert(&self, row: Row) -> Result<()> {
        let row = row.validate(&self.schema)?;
        let mut data = self.data.write();

        let mut keys = Vec::with_capacity(self.schema.unique_keys.len());
        for (i, key_cols) in self.schema.unique_keys.iter().enumerate() {
            let key: UniqueKey = key_cols.iter().map(|&c| row[c].clone()).collect();
            // NULLs never collide under a unique constraint
            if key.iter().any(Value::is_null) {
                keys.push(None);
                continue;
            }
            if data.unique[i].contains(&key) {
                let value = key
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::UniqueConstraint {
                    index: self.unique_index_name(key_cols),
                    value,
                });
            }
            keys.push(Some(key));
        }

        for (i, key) in keys.into_iter().enumerate() {
            if let Some(key) = key {
                data.unique[i].insert(key);
            }
        }
        Arc::make_mut(&mut data.rows).push(row);
        Ok(())
    }

    /// Number of rows currently stored
    pub fn len(&self) -> usize {
        self.data.read().rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access counters shared with every scanner of this table
    pub fn scan_stats(&self) -> &ScanStats {
        &self.stats
    }

    fn unique_index_name(&self, key: &[usize]) -> String {
        let names: Vec<&str> = key
            .iter()
            .filter_map(|&i| self.schema.get_column(i))
            .map(|c| c.name.as_str())
            .collect();
        format!("{}_unique_{}", self.schema.table_name, names.join("_"))
    }
}

impl std::fmt::Debug for MemoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTable")
            .field("schema", &self.schema.to_string())
            .field("rows", &self.len())
            .finish()
    }
}

impl RangeSource for MemoryTable {
    fn name(&self) -> &str {
        &self.schema.table_name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self, _ctx: &ExecutionContext) -> Result<Box<dyn Scanner>> {
        self.stats.opens.fetch_add(1, Ordering::Relaxed);
        let rows = Arc::clone(&self.data.read().rows);
        Ok(Box::new(MemoryScanner {
            inner: VecScanner::shared(rows),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn row_count(&self) -> Option<usize> {
        self.stats.count_lookups.fetch_add(1, Ordering::Relaxed);
        Some(self.len())
    }

    fn is_updatable(&self) -> bool {
        true
    }

    fn is_insertable(&self) -> bool {
        true
    }

    fn base_column_map(&self) -> Vec<Option<usize>> {
        (0..self.schema.column_count()).map(Some).collect()
    }

    fn base_schema(&self) -> Option<&Schema> {
        Some(&self.schema)
    }
}

/// Scanner over a row snapshot that records `next()` calls
struct MemoryScanner {
    inner: VecScanner,
    stats: Arc<ScanStats>,
}

impl Scanner for MemoryScanner {
    fn next(&mut self) -> bool {
        self.stats.next_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.next()
    }

    fn row(&self) -> &Row {
        self.inner.row()
    }

    fn position(&self) -> usize {
        self.inner.position()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn err(&self) -> Option<&Error> {
        self.inner.err()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
